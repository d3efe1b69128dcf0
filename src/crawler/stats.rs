//! Counters and the end-of-crawl summary

use crate::state::{CrawlPhase, StopReason};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Live counters owned by one coordinator
#[derive(Debug, Default)]
pub(crate) struct CrawlCounters {
    pub in_flight: AtomicUsize,
    pub downloads_started: AtomicU64,
    pub downloads_completed: AtomicU64,
    /// Dispatched steps that count toward the download cap
    pub crawled: AtomicU64,
    pub download_errors: AtomicU64,
    pub pipeline_errors: AtomicU64,
}

impl CrawlCounters {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn crawled(&self) -> u64 {
        self.crawled.load(Ordering::SeqCst)
    }

    pub fn download_errors(&self) -> u64 {
        self.download_errors.load(Ordering::SeqCst)
    }
}

/// Snapshot of a crawl's progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub downloads_started: u64,
    pub downloads_completed: u64,
    /// Dispatched steps counted toward the download cap
    pub pages_crawled: u64,
    pub download_errors: u64,
    pub pipeline_errors: u64,
    pub urls_registered: u64,
    pub queued_remaining: u64,
    pub elapsed: Duration,
    pub stop_reason: Option<StopReason>,
    pub phase: CrawlPhase,
}

impl CrawlStats {
    pub(crate) fn from_counters(counters: &CrawlCounters) -> Self {
        Self {
            downloads_started: counters.downloads_started.load(Ordering::SeqCst),
            downloads_completed: counters.downloads_completed.load(Ordering::SeqCst),
            pages_crawled: counters.crawled.load(Ordering::SeqCst),
            download_errors: counters.download_errors.load(Ordering::SeqCst),
            pipeline_errors: counters.pipeline_errors.load(Ordering::SeqCst),
            ..Self::default()
        }
    }

    /// True when the crawl ran out of work rather than being stopped
    pub fn exhausted_queue(&self) -> bool {
        self.stop_reason.is_none()
    }
}
