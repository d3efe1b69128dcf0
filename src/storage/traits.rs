//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types. Both traits take `&self`: implementations lock
//! internally so one store can be shared across download tasks.

use crate::crawler::QueueEntry;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger of URL keys already seen
pub trait HistoryStore: Send + Sync {
    /// Registers a key
    ///
    /// Check and insert happen atomically: when two callers race on the same
    /// key exactly one of them sees `true`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The key was new and is now registered
    /// * `Ok(false)` - The key was already registered
    fn register(&self, key: &str) -> StorageResult<bool>;

    /// Number of distinct keys registered
    fn registered_count(&self) -> StorageResult<u64>;

    /// Forgets every key
    fn clear(&self) -> StorageResult<()>;
}

/// Container of pending work items
pub trait QueueStore: Send + Sync {
    fn push(&self, entry: QueueEntry) -> StorageResult<()>;

    /// Removes and returns the next entry, if any
    fn pop(&self) -> StorageResult<Option<QueueEntry>>;

    /// Number of pending entries
    fn count(&self) -> StorageResult<u64>;

    fn clear(&self) -> StorageResult<()>;
}
