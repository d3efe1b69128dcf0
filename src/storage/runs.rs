//! Closes the run record when a crawl ends

use crate::crawler::{CrawlObserver, CrawlStats};
use crate::storage::{RunStatus, SqliteStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Observer that marks the current run completed or interrupted
pub struct RunRecorder {
    store: Arc<SqliteStore>,
    run_id: i64,
}

impl RunRecorder {
    pub fn new(store: Arc<SqliteStore>, run_id: i64) -> Self {
        Self { store, run_id }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn finish(&self, status: RunStatus) {
        if let Err(e) = self.store.finish_run(self.run_id, status) {
            tracing::warn!("Failed to record end of run {}: {}", self.run_id, e);
        }
    }
}

#[async_trait]
impl CrawlObserver for RunRecorder {
    async fn on_finished(&self, _stats: &CrawlStats) {
        self.finish(RunStatus::Completed);
    }

    async fn on_cancelled(&self, _stats: &CrawlStats) {
        self.finish(RunStatus::Interrupted);
    }
}
