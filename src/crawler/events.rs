//! Observer hooks for crawl events
//!
//! Implement [`CrawlObserver`] to veto downloads, watch failures, or react to
//! the end of a crawl. Every method has a no-op default, so observers only
//! override what they need.

use crate::crawler::downloader::DownloadError;
use crate::crawler::pipeline::PipelineError;
use crate::crawler::result::FetchResult;
use crate::crawler::stats::CrawlStats;
use crate::crawler::step::{CrawlStep, QueueEntry};
use async_trait::async_trait;
use std::sync::Arc;

/// Observer trait for receiving crawl events
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use ripple_engine::crawler::{CrawlObserver, CrawlStep};
///
/// struct SkipPdfs;
///
/// #[async_trait]
/// impl CrawlObserver for SkipPdfs {
///     async fn before_download(&self, step: &CrawlStep) -> bool {
///         !step.uri().path().ends_with(".pdf")
///     }
/// }
/// ```
#[async_trait]
pub trait CrawlObserver: Send + Sync {
    /// Called before a popped step is downloaded; `false` skips it
    async fn before_download(&self, _step: &CrawlStep) -> bool {
        true
    }

    /// Called before the pipeline runs; `false` skips the pipeline
    async fn after_download(&self, _result: &FetchResult) -> bool {
        true
    }

    /// Called when a download fails after all retries
    async fn on_download_error(&self, _entry: &QueueEntry, _error: &DownloadError) {}

    /// Called when a pipeline step fails, panics or times out
    async fn on_pipeline_error(&self, _step: &str, _result: &FetchResult, _error: &PipelineError) {
    }

    /// Called once when a crawl ends without being cancelled
    async fn on_finished(&self, _stats: &CrawlStats) {}

    /// Called once when a cancelled crawl has drained
    async fn on_cancelled(&self, _stats: &CrawlStats) {}
}

/// Registry for managing multiple crawl observers
#[derive(Default, Clone)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn CrawlObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer to receive crawl events
    pub fn register(&mut self, observer: Arc<dyn CrawlObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Asks every observer; any veto wins
    pub async fn approve_download(&self, step: &CrawlStep) -> bool {
        for observer in &self.observers {
            if !observer.before_download(step).await {
                return false;
            }
        }
        true
    }

    /// Asks every observer; any veto wins
    pub async fn approve_result(&self, result: &FetchResult) -> bool {
        for observer in &self.observers {
            if !observer.after_download(result).await {
                return false;
            }
        }
        true
    }

    pub async fn notify_download_error(&self, entry: &QueueEntry, error: &DownloadError) {
        for observer in &self.observers {
            observer.on_download_error(entry, error).await;
        }
    }

    pub async fn notify_pipeline_error(&self, step: &str, result: &FetchResult, error: &PipelineError) {
        for observer in &self.observers {
            observer.on_pipeline_error(step, result, error).await;
        }
    }

    pub async fn notify_finished(&self, stats: &CrawlStats) {
        for observer in &self.observers {
            observer.on_finished(stats).await;
        }
    }

    pub async fn notify_cancelled(&self, stats: &CrawlStats) {
        for observer in &self.observers {
            observer.on_cancelled(stats).await;
        }
    }
}
