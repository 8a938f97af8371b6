//! Database schema definitions
//!
//! Every partition of the durable map lives in one keyed table.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Partitioned ordered map
CREATE TABLE IF NOT EXISTS entries (
    partition TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (partition, key)
) WITHOUT ROWID;
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
