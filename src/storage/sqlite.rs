//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Partition, Storage, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database that disappears when dropped
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    fn get(&self, partition: Partition, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE partition = ?1 AND key = ?2",
                params![partition.to_db_string(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, partition: Partition, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (partition, key, value) VALUES (?1, ?2, ?3)",
            params![partition.to_db_string(), key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, partition: Partition, key: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM entries WHERE partition = ?1 AND key = ?2",
            params![partition.to_db_string(), key],
        )?;
        Ok(())
    }

    fn clear(&mut self, partition: Partition) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM entries WHERE partition = ?1",
            params![partition.to_db_string()],
        )?;
        Ok(())
    }

    fn iter(&self, partition: Partition, prefix: &str) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM entries
             WHERE partition = ?1 AND substr(key, 1, length(?2)) = ?2
             ORDER BY key ASC",
        )?;

        let entries = stmt
            .query_map(params![partition.to_db_string(), prefix], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn count(&self, partition: Partition) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE partition = ?1",
            params![partition.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
