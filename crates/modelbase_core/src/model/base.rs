//! Base model record and its mapping (de)serialization pair.
//!
//! # Responsibility
//! - Give every persisted object a stable id and creation/update timestamps.
//! - Export instances to a plain key/value mapping and rebuild them from one.
//! - Notify an injected storage collaborator on save.
//!
//! # Invariants
//! - `id` never changes after construction.
//! - `created_at` is assigned once, at construction, unless reconstruction
//!   input overrides it.
//! - The reserved class-tag key is synthesized on export and consumed on
//!   import; it never appears among the open attributes.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use chrono::{Local, NaiveDateTime, Timelike};
use log::debug;
use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::{Storage, StorageResult};

/// Reserved mapping key recording the concrete type tag on export.
pub const CLASS_TAG_KEY: &str = "__class__";

/// Class tag of the base type itself.
pub const BASE_MODEL_TAG: &str = "BaseModel";

/// Export rendering for timestamps. Fixed six fractional digits so exported
/// text always carries full microsecond precision.
const TIMESTAMP_EXPORT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub type ModelResult<T> = Result<T, ModelError>;

/// Error raised while rebuilding an instance from mapping input.
#[derive(Debug)]
pub enum ModelError {
    /// A timestamp field held text that is not a valid ISO-8601 datetime.
    Timestamp {
        field: &'static str,
        value: String,
        source: chrono::ParseError,
    },
    /// A typed field held a value of the wrong JSON shape.
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp {
                field,
                value,
                source,
            } => write!(f, "invalid {field} timestamp `{value}`: {source}"),
            Self::FieldType { field, expected } => {
                write!(f, "field `{field}` must be a {expected}")
            }
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Timestamp { source, .. } => Some(source),
            Self::FieldType { .. } => None,
        }
    }
}

/// Common record backing every persisted object.
///
/// Identity and timestamps are typed fields; everything else a concrete
/// variant wants to carry goes into the open `extra` mapping, which is copied
/// verbatim across export/import without validation.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseModel {
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    class_tag: String,
    extra: BTreeMap<String, Value>,
}

impl BaseModel {
    /// Creates a fresh instance tagged as the base type.
    ///
    /// # Invariants
    /// - `id` is a newly generated hyphenated UUIDv4.
    /// - `created_at` and `updated_at` share one captured timestamp.
    pub fn new() -> Self {
        Self::with_tag(BASE_MODEL_TAG)
    }

    /// Creates a fresh instance with a caller-supplied class tag.
    ///
    /// Concrete variants use this to record their own type name instead of
    /// the base tag.
    pub fn with_tag(tag: impl Into<String>) -> Self {
        let now = now_local();
        let model = Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            class_tag: tag.into(),
            extra: BTreeMap::new(),
        };
        debug!(
            "event=model_created module=model status=ok tag={} id={}",
            model.class_tag, model.id
        );
        model
    }

    /// Rebuilds an instance from previously exported mapping data.
    ///
    /// Defaults are assigned first, then folded over by the supplied entries:
    /// the reserved class-tag key is consumed into the tag, `id` replaces the
    /// generated one, the two timestamp fields are parsed from their ISO-8601
    /// text form, and every other key is copied verbatim into the open
    /// attributes. Extra keys and values are accepted without validation.
    ///
    /// # Errors
    /// - `ModelError::Timestamp` when timestamp text does not parse.
    /// - `ModelError::FieldType` when `id` or a timestamp field is not a
    ///   JSON string.
    pub fn from_mapping(fields: BTreeMap<String, Value>) -> ModelResult<Self> {
        let mut model = Self::new();

        for (key, value) in fields {
            match key.as_str() {
                CLASS_TAG_KEY => {
                    if let Value::String(tag) = value {
                        model.class_tag = tag;
                    }
                }
                "id" => match value {
                    Value::String(id) => model.id = id,
                    _ => {
                        return Err(ModelError::FieldType {
                            field: "id",
                            expected: "string",
                        })
                    }
                },
                "created_at" => model.created_at = parse_timestamp("created_at", value)?,
                "updated_at" => model.updated_at = parse_timestamp("updated_at", value)?,
                _ => {
                    model.extra.insert(key, value);
                }
            }
        }

        Ok(model)
    }

    /// Stable identifier assigned at construction.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Timestamp of construction (or the reconstructed value).
    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    /// Timestamp of the most recent save (or construction).
    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    /// Concrete type tag recorded under the reserved key on export.
    pub fn class_tag(&self) -> &str {
        &self.class_tag
    }

    /// Open attribute mapping carried alongside the typed fields.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Returns the open attribute stored under `key`, if any.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Sets an open attribute, returning the previous value when replacing.
    ///
    /// The typed fields (`id`, timestamps) and the reserved class-tag key are
    /// not open attributes; writes to those names are ignored and `None` is
    /// returned.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if matches!(key.as_str(), CLASS_TAG_KEY | "id" | "created_at" | "updated_at") {
            return None;
        }
        self.extra.insert(key, value)
    }

    /// Removes an open attribute, returning it when present.
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// Human-readable one-line rendering: tag, id and the full attribute
    /// mapping with timestamps in their in-memory form.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("id: {:?}", self.id),
            format!("created_at: {:?}", self.created_at),
            format!("updated_at: {:?}", self.updated_at),
        ];
        for (key, value) in &self.extra {
            parts.push(format!("{key}: {value}"));
        }
        format!("[{}] ({}) {{{}}}", self.class_tag, self.id, parts.join(", "))
    }

    /// Refreshes `updated_at` and asks the storage collaborator to track and
    /// persist this instance.
    ///
    /// `updated_at` is bumped before the collaborator is called and is not
    /// rolled back when registration or flushing fails.
    ///
    /// # Errors
    /// Collaborator failures propagate unchanged; no retry is attempted.
    pub fn save(&mut self, storage: &mut dyn Storage) -> StorageResult<()> {
        self.updated_at = now_local();
        storage.register(self)?;
        storage.flush()?;
        debug!(
            "event=model_saved module=model status=ok tag={} id={}",
            self.class_tag, self.id
        );
        Ok(())
    }

    /// Exports this instance as a plain key/value mapping.
    ///
    /// Open attributes are copied verbatim, timestamps are rendered as
    /// ISO-8601 text, and the reserved class-tag key records the concrete
    /// type tag. `from_mapping` is the exact inverse.
    pub fn to_mapping(&self) -> BTreeMap<String, Value> {
        let mut mapping = self.extra.clone();
        mapping.insert("id".to_string(), Value::String(self.id.clone()));
        mapping.insert(
            "created_at".to_string(),
            Value::String(format_timestamp(self.created_at)),
        );
        mapping.insert(
            "updated_at".to_string(),
            Value::String(format_timestamp(self.updated_at)),
        );
        mapping.insert(
            CLASS_TAG_KEY.to_string(),
            Value::String(self.class_tag.clone()),
        );
        mapping
    }
}

impl Default for BaseModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BaseModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// The wire shape is the exported mapping, not the struct layout.
impl Serialize for BaseModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_mapping().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BaseModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Self::from_mapping(fields).map_err(D::Error::custom)
    }
}

/// Current local time clamped to microsecond precision, so the exported
/// ISO-8601 text is a lossless rendering of the in-memory value.
fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

fn parse_timestamp(field: &'static str, value: Value) -> ModelResult<NaiveDateTime> {
    let Value::String(text) = value else {
        return Err(ModelError::FieldType {
            field,
            expected: "ISO-8601 string",
        });
    };
    text.parse::<NaiveDateTime>()
        .map_err(|source| ModelError::Timestamp {
            field,
            value: text,
            source,
        })
}

fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_EXPORT_FORMAT).to_string()
}
