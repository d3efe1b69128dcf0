//! Storage module for the URL history and the pending queue
//!
//! This module handles persistence for the crawler, including:
//! - In-memory stores for one-shot crawls
//! - SQLite database initialization and schema management
//! - Run tracking and resumption support

mod memory;
mod runs;
mod schema;
mod sqlite;
mod traits;

pub use memory::{MemoryHistory, MemoryQueue};
pub use runs::RunRecorder;
pub use sqlite::SqliteStore;
pub use traits::{HistoryStore, QueueStore, StorageError, StorageResult};

use crate::config::{QueueOrder, StorageBackend, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Stores built from configuration
pub struct Stores {
    pub history: Arc<dyn HistoryStore>,
    pub queue: Arc<dyn QueueStore>,

    /// Present for database-backed stores; completes the run record
    pub recorder: Option<RunRecorder>,
}

/// Opens the configured storage backend
///
/// # Arguments
///
/// * `config` - Storage section of the configuration
/// * `order` - Queue pop order
/// * `config_hash` - Recorded with the run so config changes can be spotted
/// * `fresh` - Clear any history and queue left by a previous run
///
/// # Returns
///
/// * `Ok(Stores)` - Ready-to-use history and queue
/// * `Err(StorageError)` - The database could not be opened
pub fn open_stores(
    config: &StorageConfig,
    order: QueueOrder,
    config_hash: &str,
    fresh: bool,
) -> StorageResult<Stores> {
    match (config.backend, config.database_path.as_deref()) {
        (StorageBackend::Sqlite, Some(path)) => {
            let store = Arc::new(SqliteStore::open(Path::new(path), order)?);
            if fresh {
                tracing::info!("Starting fresh: clearing history and queue in {}", path);
                HistoryStore::clear(store.as_ref())?;
                QueueStore::clear(store.as_ref())?;
            }
            let run_id = store.begin_run(config_hash)?;
            tracing::info!("Started run {} in {}", run_id, path);

            Ok(Stores {
                history: store.clone(),
                queue: store.clone(),
                recorder: Some(RunRecorder::new(store, run_id)),
            })
        }
        (StorageBackend::Sqlite, None) => Err(StorageError::Database(
            "sqlite backend requires database-path".to_string(),
        )),
        (StorageBackend::Memory, _) => Ok(Stores {
            history: Arc::new(MemoryHistory::new()),
            queue: Arc::new(MemoryQueue::new(order)),
            recorder: None,
        }),
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
