//! Storage collaborator contract and in-memory tracking.
//!
//! # Responsibility
//! - Define the two-operation contract the model core consumes on save.
//! - Provide an in-memory implementation that tracks exported mappings.
//!
//! # Invariants
//! - `register` only records intent; durability is owned by `flush`.
//! - Collaborator failures surface to the caller unchanged, without retry.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use log::debug;
use serde_json::Value;

use crate::model::base::BaseModel;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure raised by a storage collaborator during register or flush.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Backend(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Backend(message) => write!(f, "storage backend failure: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Backend(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Contract the model core consumes when saving an instance.
///
/// Implementations own tracking and durability; the core only asks to track
/// (`register`) and then to persist everything tracked so far (`flush`).
pub trait Storage {
    /// Informs storage that `instance` should be tracked for persistence.
    fn register(&mut self, instance: &BaseModel) -> StorageResult<()>;

    /// Asks storage to durably persist all tracked instances.
    fn flush(&mut self) -> StorageResult<()>;
}

/// Storage collaborator that tracks exported mappings in memory.
///
/// Instances are keyed `<tag>.<id>`, so one store can hold multiple concrete
/// variants side by side. `flush` is a no-op for this backend; everything it
/// tracks already lives in its map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: BTreeMap<String, BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked instances.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the tracked mapping stored under `<tag>.<id>`, if any.
    pub fn get(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.objects.get(key)
    }

    /// All tracked mappings, keyed `<tag>.<id>`.
    pub fn objects(&self) -> &BTreeMap<String, BTreeMap<String, Value>> {
        &self.objects
    }
}

impl Storage for MemoryStorage {
    fn register(&mut self, instance: &BaseModel) -> StorageResult<()> {
        let key = format!("{}.{}", instance.class_tag(), instance.id());
        self.objects.insert(key, instance.to_mapping());
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        debug!(
            "event=storage_flushed module=storage status=ok backend=memory tracked={}",
            self.objects.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStorage, Storage};
    use crate::model::base::BaseModel;
    use serde_json::Value;

    #[test]
    fn register_tracks_exported_mapping_under_tagged_key() {
        let mut storage = MemoryStorage::new();
        let model = BaseModel::new();

        storage
            .register(&model)
            .expect("memory registration should succeed");

        let key = format!("BaseModel.{}", model.id());
        let tracked = storage.get(&key).expect("instance should be tracked");
        assert_eq!(tracked, &model.to_mapping());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn register_replaces_earlier_snapshot_of_same_instance() {
        let mut storage = MemoryStorage::new();
        let mut model = BaseModel::new();

        storage.register(&model).expect("first registration");
        model.set_attribute("name", Value::String("renamed".to_string()));
        storage.register(&model).expect("second registration");

        assert_eq!(storage.len(), 1);
        let key = format!("BaseModel.{}", model.id());
        let tracked = storage.get(&key).expect("instance should be tracked");
        assert_eq!(tracked.get("name"), Some(&Value::String("renamed".to_string())));
    }

    #[test]
    fn flush_is_a_no_op_for_memory_backend() {
        let mut storage = MemoryStorage::new();
        storage.flush().expect("flush should never fail in memory");
        assert!(storage.is_empty());
    }
}
