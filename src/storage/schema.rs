//! Database schema for the SQLite store
//!
//! The schema version lives in SQLite's `user_version` pragma. A database
//! written by a newer version of the crate is refused rather than modified.

use crate::storage::{StorageError, StorageResult};
use rusqlite::Connection;

/// Version written to `user_version` by [`initialize_schema`]
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per normalized URL key ever admitted
CREATE TABLE IF NOT EXISTS history (
    url_key TEXT PRIMARY KEY,
    registered_at TEXT NOT NULL
);

-- Pending queue entries as JSON; id order gives push order
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entry TEXT NOT NULL
);
"#;

/// Creates the tables if missing and stamps the schema version
///
/// # Returns
///
/// * `Ok(())` - The database is at [`SCHEMA_VERSION`]
/// * `Err(StorageError::Database)` - The file was written by a newer schema
/// * `Err(StorageError::Sqlite)` - SQLite rejected a statement
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(StorageError::Database(format!(
            "database schema version {} is newer than supported version {}",
            found, SCHEMA_VERSION
        )));
    }

    conn.execute_batch(SCHEMA_SQL)?;
    if found < SCHEMA_VERSION {
        tracing::debug!("Upgrading database schema from {} to {}", found, SCHEMA_VERSION);
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}
