//! Storage module for persisting replication state
//!
//! This module handles all durable state of a replication, including:
//! - SQLite database initialization and schema management
//! - The partitioned key-value interface the scheduler persists through
//! - Shared, lockable handles passed to the scheduler and strategies

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Partition, Storage, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A storage backend shared between the owners of one replication
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Wraps a backend into a shareable handle
pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Opens a database file as a shared handle
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> StorageResult<SharedStorage> {
    Ok(shared(SqliteStorage::new(path)?))
}

/// Locks a shared handle, surfacing poisoning as an error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_handle_roundtrip() {
        let storage = shared(SqliteStorage::in_memory().unwrap());
        lock(&storage)
            .unwrap()
            .put(Partition::Meta, "key", "value")
            .unwrap();

        let clone = Arc::clone(&storage);
        assert_eq!(
            lock(&clone).unwrap().get(Partition::Meta, "key").unwrap(),
            Some("value".to_string())
        );
    }
}
