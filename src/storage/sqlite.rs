//! SQLite storage implementation
//!
//! One database file holds the URL history, the pending queue and the list
//! of runs, so an interrupted crawl can pick up where it stopped.

use crate::config::QueueOrder;
use crate::crawler::QueueEntry;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{HistoryStore, QueueStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend implementing both [`HistoryStore`] and [`QueueStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    order: QueueOrder,
}

impl SqliteStore {
    /// Opens (or creates) a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `order` - Which end of the queue `pop` takes from
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path, order: QueueOrder) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            order,
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory(order: QueueOrder) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            order,
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    // ===== Run Management =====

    /// Records the start of a run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Marks a run finished with the given status
    pub fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Starts a run, warning if the last one used a different configuration
    ///
    /// A pending queue left by a run with another config hash is still
    /// resumed; the warning is the only signal.
    pub fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        if let Some(previous) = self.get_latest_run()? {
            if previous.config_hash != config_hash && self.count()? > 0 {
                tracing::warn!(
                    "Configuration changed since run {} ({}); resuming its queue anyway",
                    previous.id,
                    previous.status.to_db_string()
                );
            }
            if previous.status == RunStatus::Running {
                tracing::info!("Previous run {} did not finish cleanly", previous.id);
                self.finish_run(previous.id, RunStatus::Interrupted)?;
            }
        }
        self.create_run(config_hash)
    }
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl HistoryStore for SqliteStore {
    fn register(&self, key: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO history (url_key, registered_at) VALUES (?1, ?2)",
            params![key, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn registered_count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn clear(&self) -> StorageResult<()> {
        self.conn()?.execute("DELETE FROM history", [])?;
        Ok(())
    }
}

impl QueueStore for SqliteStore {
    fn push(&self, entry: QueueEntry) -> StorageResult<()> {
        let json = serde_json::to_string(&entry)?;
        self.conn()?
            .execute("INSERT INTO queue (entry) VALUES (?1)", params![json])?;
        Ok(())
    }

    fn pop(&self) -> StorageResult<Option<QueueEntry>> {
        let conn = self.conn()?;
        let sql = match self.order {
            QueueOrder::Lifo => "SELECT id, entry FROM queue ORDER BY id DESC LIMIT 1",
            QueueOrder::Fifo => "SELECT id, entry FROM queue ORDER BY id ASC LIMIT 1",
        };

        let row: Option<(i64, String)> = conn
            .query_row(sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((id, json)) = row else {
            return Ok(None);
        };

        conn.execute("DELETE FROM queue WHERE id = ?1", params![id])?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn clear(&self) -> StorageResult<()> {
        self.conn()?.execute("DELETE FROM queue", [])?;
        Ok(())
    }
}
