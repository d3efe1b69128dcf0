//! In-memory history and queue stores
//!
//! Used when no database is configured. Nothing survives the process.

use crate::config::QueueOrder;
use crate::crawler::QueueEntry;
use crate::storage::traits::{HistoryStore, QueueStore, StorageError, StorageResult};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, RwLock};

/// History backed by a hash set
///
/// Lookups of already-known keys only take the read lock; the write lock is
/// taken for the insert, which itself reports whether the key was new.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    keys: RwLock<HashSet<String>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn register(&self, key: &str) -> StorageResult<bool> {
        {
            let keys = self.keys.read().map_err(|_| StorageError::LockPoisoned)?;
            if keys.contains(key) {
                return Ok(false);
            }
        }

        let mut keys = self.keys.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(keys.insert(key.to_string()))
    }

    fn registered_count(&self) -> StorageResult<u64> {
        let keys = self.keys.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(keys.len() as u64)
    }

    fn clear(&self) -> StorageResult<()> {
        self.keys
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

/// Queue backed by a deque
#[derive(Debug, Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    order: QueueOrder,
}

impl MemoryQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            order,
        }
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }
}

impl QueueStore for MemoryQueue {
    fn push(&self, entry: QueueEntry) -> StorageResult<()> {
        self.entries
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .push_back(entry);
        Ok(())
    }

    fn pop(&self) -> StorageResult<Option<QueueEntry>> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(match self.order {
            QueueOrder::Lifo => entries.pop_back(),
            QueueOrder::Fifo => entries.pop_front(),
        })
    }

    fn count(&self) -> StorageResult<u64> {
        let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.len() as u64)
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }
}
