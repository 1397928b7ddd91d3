//! Core persistence base for modelbase.
//!
//! Every persisted object shares one record shape: a stable id, creation and
//! update timestamps, an explicit class tag and an open attribute mapping.
//! This crate owns that record, its mapping export/import pair, and the
//! two-operation storage contract consumed on save.

pub mod logging;
pub mod model;
pub mod storage;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::base::{BaseModel, ModelError, ModelResult, BASE_MODEL_TAG, CLASS_TAG_KEY};
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
