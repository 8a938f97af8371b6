//! Storage traits and error types
//!
//! This module defines the durable ordered-map interface the replicator
//! persists its state through, and the partitions it is split into.

use std::fmt;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Corrupt entry {partition}/{key}: {message}")]
    Corrupt {
        partition: Partition,
        key: String,
        message: String,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Named partitions of the durable map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Scheduled jobs waiting for a slot
    Pending,
    /// Dispatched jobs that have not finished
    Inflight,
    /// Fragments that may still change and are re-polled
    Mutable,
    /// Fragments that are cacheable forever
    Immutable,
    /// Members already delivered to the consumer
    Emitted,
    /// Members extracted but still buffered for ordering
    Unemitted,
    /// Members rejected by the member condition
    Filtered,
    /// Latest seen version timestamp per logical member
    LatestVersions,
    /// Counters and bookkeeping
    Meta,
}

impl Partition {
    /// All partitions, in declaration order
    pub const ALL: [Partition; 9] = [
        Self::Pending,
        Self::Inflight,
        Self::Mutable,
        Self::Immutable,
        Self::Emitted,
        Self::Unemitted,
        Self::Filtered,
        Self::LatestVersions,
        Self::Meta,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Inflight => "inflight",
            Self::Mutable => "mutable",
            Self::Immutable => "immutable",
            Self::Emitted => "emitted",
            Self::Unemitted => "unemitted",
            Self::Filtered => "filtered",
            Self::LatestVersions => "latestVersions",
            Self::Meta => "meta",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.to_db_string() == s)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Trait for durable key-value backends
///
/// Keys are ordered within a partition; `iter` and `keys` return entries in
/// ascending key order. Every operation is independent: there are no
/// cross-partition transactions.
pub trait Storage {
    /// Reads one entry
    fn get(&self, partition: Partition, key: &str) -> StorageResult<Option<String>>;

    /// Writes one entry, replacing any previous value
    fn put(&mut self, partition: Partition, key: &str, value: &str) -> StorageResult<()>;

    /// Removes one entry; removing a missing key is not an error
    fn delete(&mut self, partition: Partition, key: &str) -> StorageResult<()>;

    /// Removes every entry of a partition
    fn clear(&mut self, partition: Partition) -> StorageResult<()>;

    /// Returns all entries of a partition whose key starts with `prefix`
    fn iter(&self, partition: Partition, prefix: &str) -> StorageResult<Vec<(String, String)>>;

    /// Counts the entries of a partition
    fn count(&self, partition: Partition) -> StorageResult<u64>;

    /// Returns true if the key is present
    fn contains(&self, partition: Partition, key: &str) -> StorageResult<bool> {
        Ok(self.get(partition, key)?.is_some())
    }

    /// Removes every entry of every partition
    fn clear_all(&mut self) -> StorageResult<()> {
        for partition in Partition::ALL {
            self.clear(partition)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_roundtrip() {
        for partition in Partition::ALL {
            assert_eq!(
                Partition::from_db_string(partition.to_db_string()),
                Some(partition)
            );
        }
    }

    #[test]
    fn test_partition_invalid() {
        assert_eq!(Partition::from_db_string("frontier"), None);
    }
}
