use modelbase_core::{BaseModel, MemoryStorage, Storage, StorageError, StorageResult};
use serde_json::json;
use std::thread::sleep;
use std::time::Duration;

/// Test double recording the order of collaborator calls, with switchable
/// failure injection per operation.
#[derive(Default)]
struct RecordingStorage {
    calls: Vec<&'static str>,
    fail_register: bool,
    fail_flush: bool,
}

impl Storage for RecordingStorage {
    fn register(&mut self, _instance: &BaseModel) -> StorageResult<()> {
        self.calls.push("register");
        if self.fail_register {
            return Err(StorageError::Backend("register rejected".to_string()));
        }
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.calls.push("flush");
        if self.fail_flush {
            return Err(StorageError::Backend("flush rejected".to_string()));
        }
        Ok(())
    }
}

#[test]
fn save_bumps_updated_at_and_tracks_instance() {
    let mut storage = MemoryStorage::new();
    let mut model = BaseModel::new();
    model.set_attribute("name", json!("My First Model"));
    let before = model.updated_at();

    sleep(Duration::from_millis(2));
    model.save(&mut storage).expect("save should succeed");

    assert!(model.updated_at() > before);
    assert_eq!(model.created_at(), before);

    let key = format!("BaseModel.{}", model.id());
    let tracked = storage.get(&key).expect("instance should be tracked");
    assert_eq!(tracked, &model.to_mapping());
}

#[test]
fn save_calls_register_then_flush() {
    let mut storage = RecordingStorage::default();
    let mut model = BaseModel::new();

    model.save(&mut storage).expect("save should succeed");

    assert_eq!(storage.calls, vec!["register", "flush"]);
}

#[test]
fn repeated_saves_never_decrease_updated_at() {
    let mut storage = MemoryStorage::new();
    let mut model = BaseModel::new();
    let created = model.created_at();

    for _ in 0..3 {
        let before = model.updated_at();
        model.save(&mut storage).expect("save should succeed");
        assert!(model.updated_at() >= before);
    }

    assert!(model.updated_at() >= created);
    assert_eq!(model.created_at(), created);
    assert_eq!(storage.len(), 1);
}

#[test]
fn failed_register_skips_flush_and_surfaces_error() {
    let mut storage = RecordingStorage {
        fail_register: true,
        ..RecordingStorage::default()
    };
    let mut model = BaseModel::new();

    let err = model
        .save(&mut storage)
        .expect_err("register failure must propagate");

    assert!(matches!(err, StorageError::Backend(_)));
    assert_eq!(storage.calls, vec!["register"]);
}

#[test]
fn failed_flush_still_leaves_updated_at_bumped() {
    let mut storage = RecordingStorage {
        fail_flush: true,
        ..RecordingStorage::default()
    };
    let mut model = BaseModel::new();
    let before = model.updated_at();

    sleep(Duration::from_millis(2));
    let err = model
        .save(&mut storage)
        .expect_err("flush failure must propagate");

    assert!(matches!(err, StorageError::Backend(_)));
    // The timestamp mutation is not rolled back on collaborator failure.
    assert!(model.updated_at() > before);
    assert_eq!(storage.calls, vec!["register", "flush"]);
}

#[test]
fn memory_storage_tracks_variants_side_by_side() {
    let mut storage = MemoryStorage::new();
    let mut base = BaseModel::new();
    let mut user = BaseModel::with_tag("User");
    user.set_attribute("email", json!("a@example.com"));

    base.save(&mut storage).expect("base save");
    user.save(&mut storage).expect("user save");

    assert_eq!(storage.len(), 2);
    assert!(storage
        .objects()
        .contains_key(&format!("BaseModel.{}", base.id())));
    assert!(storage
        .objects()
        .contains_key(&format!("User.{}", user.id())));
}
