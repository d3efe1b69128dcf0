//! Shared fixtures for crawler unit tests

use crate::crawler::coordinator::Coordinator;
use crate::crawler::downloader::{DownloadError, Downloader};
use crate::crawler::events::CrawlObserver;
use crate::crawler::result::FetchResult;
use crate::crawler::stats::CrawlStats;
use crate::crawler::step::{CrawlStep, Properties, QueueEntry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type Respond = Box<dyn Fn(&QueueEntry) -> Result<FetchResult, DownloadError> + Send + Sync>;

/// Downloader that answers from a closure without touching the network
pub struct StaticDownloader {
    respond: Respond,
}

impl StaticDownloader {
    /// Every download succeeds with an empty 200 response
    pub fn ok() -> Self {
        Self {
            respond: Box::new(|entry| Ok(FetchResult::new(entry.clone(), 200))),
        }
    }

    /// Every download fails with the error `make` builds
    pub fn failing<F>(make: F) -> Self
    where
        F: Fn(&QueueEntry) -> DownloadError + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(move |entry| Err(make(entry))),
        }
    }

    /// Every download panics
    pub fn panicking() -> Self {
        Self {
            respond: Box::new(|entry| panic!("downloader blew up on {}", entry.step().uri())),
        }
    }
}

#[async_trait]
impl Downloader for StaticDownloader {
    async fn download(&self, entry: &QueueEntry) -> Result<FetchResult, DownloadError> {
        (self.respond)(entry)
    }
}

/// Downloader that takes `delay` per URL; paths starting with the failing
/// prefix fail at once instead
pub struct SlowDownloader {
    delay: Duration,
    failing_prefix: Option<&'static str>,
}

impl SlowDownloader {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failing_prefix: None,
        }
    }

    pub fn failing_paths(mut self, prefix: &'static str) -> Self {
        self.failing_prefix = Some(prefix);
        self
    }
}

#[async_trait]
impl Downloader for SlowDownloader {
    async fn download(&self, entry: &QueueEntry) -> Result<FetchResult, DownloadError> {
        let uri = entry.step().uri();
        if let Some(prefix) = self.failing_prefix {
            if uri.path().starts_with(prefix) {
                return Err(DownloadError::Timeout {
                    url: uri.to_string(),
                });
            }
        }
        tokio::time::sleep(self.delay).await;
        Ok(FetchResult::new(entry.clone(), 200))
    }
}

/// Observer counting the lifecycle notifications it receives
#[derive(Default)]
pub struct EventLog {
    pub download_errors: AtomicUsize,
    pub finished: AtomicUsize,
    pub cancelled: AtomicUsize,
}

impl EventLog {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlObserver for EventLog {
    async fn on_download_error(&self, _entry: &QueueEntry, _error: &DownloadError) {
        self.download_errors.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_finished(&self, _stats: &CrawlStats) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_cancelled(&self, _stats: &CrawlStats) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Seeds `https://example.com/{prefix}{i}` for `i` in `0..n`
pub fn seeds(prefix: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("https://example.com/{}{}", prefix, i))
        .collect()
}

/// Coordinator with in-memory stores, no seeds and no pipeline
pub fn test_coordinator() -> Coordinator {
    Coordinator::builder()
        .downloader(Arc::new(StaticDownloader::ok()))
        .build()
        .unwrap()
}

/// A 200 result for `url` at depth 0
pub fn fetch_result(url: &str) -> FetchResult {
    let step = CrawlStep::new(Url::parse(url).unwrap(), 0).unwrap();
    FetchResult::new(QueueEntry::new(step, None, Properties::new()), 200)
}
