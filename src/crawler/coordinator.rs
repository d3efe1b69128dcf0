//! Crawl coordinator - the main orchestration logic
//!
//! The coordinator owns the queue, the history and the downloader, and is
//! responsible for:
//! - Admitting discovered URLs (depth, filters, robots.txt, dedup)
//! - Dispatching downloads up to the concurrency limit
//! - Running each download through the pipeline
//! - Stopping on limits or cancellation and detecting completion
//!
//! [`Coordinator`] is a cheap handle: clones share one crawl.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::builder::CoordinatorBuilder;
use crate::crawler::concurrency::CompletionSignal;
use crate::crawler::downloader::{DownloadError, Downloader, HttpDownloader};
use crate::crawler::events::ObserverRegistry;
use crate::crawler::parser::{LinkExtractor, StatusReporter};
use crate::crawler::pipeline::{panic_message, PipelineError, PipelineRunner};
use crate::crawler::result::FetchResult;
use crate::crawler::stats::{CrawlCounters, CrawlStats};
use crate::crawler::step::{CrawlStep, Properties, QueueEntry};
use crate::filter::{DomainFilter, FilterSet, FilterVerdict};
use crate::robots::{RobotsCache, RobotsPolicy};
use crate::state::{CrawlPhase, PhaseCell, StopReason};
use crate::storage::{open_stores, HistoryStore, QueueStore};
use crate::url::{site_host, url_key, UrlSensitivity};
use crate::RippleError;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use url::Url;

/// Limits that shape one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub max_concurrent_downloads: usize,
    /// Deepest link distance from a seed that is still downloaded
    pub max_depth: Option<u32>,
    /// Crawled-page cap; steps not allowed by robots.txt are not counted
    pub max_downloads: Option<u64>,
    pub max_download_errors: Option<u64>,
    pub max_crawl_time: Option<Duration>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 4,
            max_depth: None,
            max_downloads: None,
            max_download_errors: None,
            max_crawl_time: None,
        }
    }
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_concurrent_downloads: config.max_concurrent_downloads as usize,
            max_depth: config.max_depth,
            max_downloads: config.max_downloads,
            max_download_errors: config.max_download_errors,
            max_crawl_time: config.max_crawl_time.map(Duration::from_secs),
        }
    }
}

pub(crate) struct Inner {
    pub settings: CrawlSettings,
    pub seeds: Vec<Url>,
    pub seed_hosts: HashSet<String>,
    pub history: Arc<dyn HistoryStore>,
    pub queue: Arc<dyn QueueStore>,
    pub downloader: Arc<dyn Downloader>,
    pub pipeline: PipelineRunner,
    pub observers: ObserverRegistry,
    pub filters: FilterSet,
    pub robots: Option<Arc<dyn RobotsPolicy>>,
    pub sensitivity: UrlSensitivity,

    pub phase: PhaseCell,
    pub used: AtomicBool,
    pub cancelled: AtomicBool,
    pub stop_requested: AtomicBool,
    pub stop_reason: Mutex<Option<StopReason>>,
    pub counters: CrawlCounters,
    pub drain_lock: Mutex<()>,
    pub drain_requested: AtomicBool,
    pub completion: CompletionSignal,
    pub started_at: OnceLock<Instant>,
}

/// Main crawler coordinator
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

/// Holds one in-flight slot; releasing it runs another drain pass
struct SlotGuard {
    crawler: Coordinator,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.crawler
            .inner
            .counters
            .in_flight
            .fetch_sub(1, Ordering::SeqCst);
        self.crawler.process_queue();
    }
}

impl Coordinator {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Starts a fluent builder
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Wires a coordinator from a configuration file
    ///
    /// Builds the HTTP downloader, opens the configured storage backend,
    /// turns the filter section into include/exclude filters, enables the
    /// robots.txt cache and installs the default pipeline (status
    /// reporting, then link extraction).
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `fresh` - Discard history and queue left by a previous run
    pub fn from_config(config: &Config, config_hash: &str, fresh: bool) -> Result<Self, RippleError> {
        let stores = open_stores(
            &config.storage,
            config.crawler.queue_order,
            config_hash,
            fresh,
        )?;
        let downloader = HttpDownloader::new(&config.user_agent, &config.download)?;
        let step_timeout = config.crawler.step_timeout.map(Duration::from_millis);

        let mut builder = CoordinatorBuilder::new()
            .settings(CrawlSettings::from(&config.crawler))
            .seeds(config.crawler.seeds.iter().cloned())
            .downloader(Arc::new(downloader))
            .history(stores.history)
            .queue(stores.queue)
            .url_sensitivity(UrlSensitivity::from(&config.url))
            .follow_external(config.filters.follow_external)
            .pipeline_step(Arc::new(StatusReporter::new().with_timeout(step_timeout)))
            .pipeline_step(Arc::new(LinkExtractor::new().with_timeout(step_timeout)));

        if !config.filters.include.is_empty() {
            builder = builder.include(Arc::new(DomainFilter::new(&config.filters.include)));
        }
        if !config.filters.exclude.is_empty() {
            builder = builder.exclude(Arc::new(DomainFilter::new(&config.filters.exclude)));
        }

        if config.filters.respect_robots {
            let client = crate::crawler::build_http_client(&config.user_agent, &config.download)?;
            builder = builder.robots(Arc::new(RobotsCache::new(
                client,
                &config.user_agent.crawler_name,
                Duration::from_millis(config.download.read_timeout),
            )));
        }

        if let Some(recorder) = stores.recorder {
            builder = builder.observer(Arc::new(recorder));
        }

        builder.build()
    }

    /// Runs the crawl to completion
    ///
    /// Seeds are queued at depth 0 unless the queue store already holds
    /// entries from an earlier run, in which case draining simply resumes.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStats)` - Final counters and the reason for stopping, if any
    /// * `Err(RippleError::AlreadyUsed)` - This coordinator already crawled
    /// * `Err(RippleError)` - The stores failed while seeding
    pub async fn crawl(&self) -> Result<CrawlStats, RippleError> {
        let inner = &self.inner;
        if inner.used.swap(true, Ordering::SeqCst) {
            return Err(RippleError::AlreadyUsed);
        }
        let _ = inner.started_at.set(Instant::now());

        let pending = inner.queue.count()?;
        if pending > 0 {
            tracing::info!("Resuming crawl with {} queued entries", pending);
        } else {
            tracing::info!("Seeding crawl with {} URLs", inner.seeds.len());
            let mut accepted = 0;
            for seed in &inner.seeds {
                if self.add_step(seed.clone(), 0, None, Properties::new()).await? {
                    accepted += 1;
                } else {
                    tracing::warn!("Seed rejected: {}", seed);
                }
            }
            if accepted == 0 {
                self.request_stop(StopReason::SeedRejected);
            }
        }

        inner
            .phase
            .transition(CrawlPhase::Running)
            .map_err(|from| RippleError::InvalidTransition {
                from,
                to: CrawlPhase::Running,
            })?;
        if inner.stop_requested.load(Ordering::SeqCst) {
            let _ = inner.phase.transition(CrawlPhase::Stopping);
        }

        let timer = inner.settings.max_crawl_time.map(|limit| {
            let crawler = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                crawler.request_stop(StopReason::MaxCrawlTime);
                crawler.process_queue();
            })
        });

        self.process_queue();
        inner.completion.wait().await;

        if let Some(timer) = timer {
            timer.abort();
        }

        let stats = self.stats();
        if inner.cancelled.load(Ordering::SeqCst) {
            inner.observers.notify_cancelled(&stats).await;
        } else {
            inner.observers.notify_finished(&stats).await;
        }

        tracing::info!(
            "Crawl finished: {} downloads, {} errors, {} still queued{}",
            stats.downloads_completed,
            stats.download_errors,
            stats.queued_remaining,
            stats
                .stop_reason
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );

        Ok(stats)
    }

    /// Offers a URL to the crawl
    ///
    /// The URL is admitted when, in order:
    /// 1. it is http(s) with a host, and `depth` is within the depth limit
    /// 2. no exclude filter rejects it (an include filter overrides excludes
    ///    and robots.txt)
    /// 3. robots.txt allows it, unless an include filter matched
    /// 4. its dedup key has not been registered before
    ///
    /// An include-admitted URL that robots.txt disallows is still fetched,
    /// but is not counted toward the download limit.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The URL was queued
    /// * `Ok(false)` - The URL was rejected by one of the rules above
    /// * `Err(RippleError)` - The history or queue store failed
    pub async fn add_step(
        &self,
        uri: Url,
        depth: u32,
        referrer: Option<&CrawlStep>,
        properties: Properties,
    ) -> Result<bool, RippleError> {
        let inner = &self.inner;

        let mut step = match CrawlStep::new(uri, depth) {
            Ok(step) => step,
            Err(e) => {
                tracing::debug!("Rejected step: {}", e);
                return Ok(false);
            }
        };

        if let Some(max_depth) = inner.settings.max_depth {
            if depth > max_depth {
                tracing::debug!("Rejected {} at depth {} (max {})", step.uri(), depth, max_depth);
                return Ok(false);
            }
        }

        let verdict = inner.filters.evaluate(step.uri(), referrer);
        if verdict == FilterVerdict::Exclude {
            tracing::debug!("Rejected {} by exclude filter", step.uri());
            return Ok(false);
        }

        let robots_allowed = match &inner.robots {
            Some(robots) => robots.is_allowed(step.uri()).await,
            None => true,
        };
        if !robots_allowed && verdict != FilterVerdict::Include {
            tracing::info!("URL {} disallowed by robots.txt", step.uri());
            return Ok(false);
        }

        let key = url_key(step.uri(), &inner.sensitivity);
        if !inner.history.register(&key)? {
            tracing::debug!("Already seen {}", step.uri());
            return Ok(false);
        }

        let is_external = site_host(step.uri()).map_or(true, |h| !inner.seed_hosts.contains(&h));
        step.mark(robots_allowed, is_external);

        tracing::debug!("Queued {} (depth {})", step.uri(), depth);
        inner
            .queue
            .push(QueueEntry::new(step, referrer.cloned(), properties))?;

        self.process_queue();
        Ok(true)
    }

    /// Stops dispatching new downloads
    ///
    /// In-flight downloads finish, then `crawl()` returns and observers get
    /// `on_cancelled`. Queued entries are left in the queue store.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The crawl is now stopping
    /// * `Err(RippleError::AlreadyCancelled)` - A previous call already did this
    pub fn cancel(&self) -> Result<(), RippleError> {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return Err(RippleError::AlreadyCancelled);
        }
        tracing::info!("Crawl cancelled");
        self.request_stop(StopReason::Cancelled);
        self.process_queue();
        Ok(())
    }

    pub fn phase(&self) -> CrawlPhase {
        self.inner.phase.get()
    }

    /// First reason a stop was requested, if any
    pub fn stop_reason(&self) -> Option<StopReason> {
        *self
            .inner
            .stop_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Snapshot of the crawl's counters
    pub fn stats(&self) -> CrawlStats {
        let inner = &self.inner;
        let mut stats = CrawlStats::from_counters(&inner.counters);
        stats.urls_registered = inner.history.registered_count().unwrap_or(0);
        stats.queued_remaining = inner.queue.count().unwrap_or(0);
        stats.elapsed = inner
            .started_at
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default();
        stats.stop_reason = self.stop_reason();
        stats.phase = self.phase();
        stats
    }

    pub(crate) async fn report_pipeline_error(&self, step: &str, result: &FetchResult, error: &PipelineError) {
        self.inner
            .counters
            .pipeline_errors
            .fetch_add(1, Ordering::SeqCst);
        self.inner
            .observers
            .notify_pipeline_error(step, result, error)
            .await;
    }

    fn request_stop(&self, reason: StopReason) {
        {
            let mut slot = self
                .inner
                .stop_reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                tracing::info!("Stopping crawl: {}", reason);
                *slot = Some(reason);
            }
        }
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        let _ = self.inner.phase.transition(CrawlPhase::Stopping);
    }

    fn complete(&self) {
        let _ = self.inner.phase.transition(CrawlPhase::Completed);
        if self.inner.completion.set() {
            tracing::debug!("Crawl complete");
        }
    }

    /// Runs a drain pass
    ///
    /// Safe to call from any task or from a `Drop`. Passes are serialized:
    /// a call that finds another pass running leaves a request behind and
    /// returns, and the running pass goes around once more.
    pub fn process_queue(&self) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("process_queue called outside a tokio runtime");
            return;
        };

        let inner = &self.inner;
        inner.drain_requested.store(true, Ordering::SeqCst);

        loop {
            let guard = match inner.drain_lock.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            while inner.drain_requested.swap(false, Ordering::SeqCst) {
                self.drain(&handle);
            }

            drop(guard);
            if !inner.drain_requested.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn drain(&self, handle: &Handle) {
        let inner = &self.inner;
        let phase = inner.phase.get();
        if phase == CrawlPhase::NotStarted || phase.is_terminal() {
            return;
        }

        loop {
            let in_flight = inner.counters.in_flight();
            let queued = match inner.queue.count() {
                Ok(queued) => queued,
                Err(e) => {
                    tracing::error!("Queue store failed: {}", e);
                    self.request_stop(StopReason::StorageFailure);
                    0
                }
            };

            if in_flight == 0 && queued == 0 {
                self.complete();
                return;
            }

            if inner.stop_requested.load(Ordering::SeqCst) {
                if in_flight == 0 {
                    self.complete();
                }
                return;
            }

            if let (Some(limit), Some(started)) = (inner.settings.max_crawl_time, inner.started_at.get()) {
                if started.elapsed() >= limit {
                    self.request_stop(StopReason::MaxCrawlTime);
                    continue;
                }
            }

            if let Some(max) = inner.settings.max_downloads {
                if inner.counters.crawled() >= max {
                    self.request_stop(StopReason::MaxDownloads);
                    continue;
                }
            }

            if in_flight >= inner.settings.max_concurrent_downloads || queued == 0 {
                return;
            }

            let entry = match inner.queue.pop() {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Queue store failed: {}", e);
                    self.request_stop(StopReason::StorageFailure);
                    continue;
                }
            };

            inner.counters.in_flight.fetch_add(1, Ordering::SeqCst);
            if entry.step().is_allowed() {
                inner.counters.crawled.fetch_add(1, Ordering::SeqCst);
            }

            let slot = SlotGuard {
                crawler: self.clone(),
            };
            let crawler = self.clone();
            handle.spawn(async move {
                let _slot = slot;
                let reported = entry.clone();
                if let Err(payload) = AssertUnwindSafe(crawler.execute(entry)).catch_unwind().await {
                    let error = DownloadError::Panicked {
                        url: reported.step().uri().to_string(),
                        message: panic_message(payload),
                    };
                    crawler.record_download_error(&reported, error).await;
                }
            });
        }
    }

    async fn execute(&self, entry: QueueEntry) {
        let inner = &self.inner;

        if !inner.observers.approve_download(entry.step()).await {
            tracing::debug!("Download of {} vetoed", entry.step().uri());
            return;
        }

        inner
            .counters
            .downloads_started
            .fetch_add(1, Ordering::SeqCst);

        match inner.downloader.download(&entry).await {
            Ok(mut result) => {
                inner
                    .counters
                    .downloads_completed
                    .fetch_add(1, Ordering::SeqCst);

                if !inner.observers.approve_result(&result).await {
                    tracing::debug!("Result for {} vetoed", entry.step().uri());
                    return;
                }

                inner.pipeline.run(self, &mut result).await;
            }
            Err(e) => self.record_download_error(&entry, e).await,
        }
    }

    /// Counts a failed work item, reports it and applies the error limit
    async fn record_download_error(&self, entry: &QueueEntry, error: DownloadError) {
        let inner = &self.inner;
        let errors = inner
            .counters
            .download_errors
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        tracing::warn!("Download failed for {}: {}", entry.step().uri(), error);
        inner.observers.notify_download_error(entry, &error).await;

        if let Some(max) = inner.settings.max_download_errors {
            if errors >= max {
                self.request_stop(StopReason::MaxDownloadErrors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::{seeds, test_coordinator, EventLog, SlowDownloader, StaticDownloader};
    use crate::filter::ExternalHostFilter;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_settings_from_config() {
        let config = CrawlerConfig {
            seeds: vec![],
            max_concurrent_downloads: 8,
            max_depth: Some(2),
            max_downloads: None,
            max_download_errors: Some(5),
            max_crawl_time: Some(60),
            queue_order: Default::default(),
            step_timeout: None,
        };
        let settings = CrawlSettings::from(&config);
        assert_eq!(settings.max_concurrent_downloads, 8);
        assert_eq!(settings.max_depth, Some(2));
        assert_eq!(settings.max_crawl_time, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_add_step_dedups_by_key() {
        let crawler = test_coordinator();
        assert!(crawler
            .add_step(url("https://example.com/a"), 1, None, Properties::new())
            .await
            .unwrap());
        assert!(!crawler
            .add_step(url("http://EXAMPLE.com/a"), 1, None, Properties::new())
            .await
            .unwrap());
        assert_eq!(crawler.stats().queued_remaining, 1);
        assert_eq!(crawler.stats().urls_registered, 1);
    }

    #[tokio::test]
    async fn test_add_step_enforces_max_depth() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .max_depth(Some(1))
            .build()
            .unwrap();

        assert!(crawler
            .add_step(url("https://example.com/1"), 1, None, Properties::new())
            .await
            .unwrap());
        assert!(!crawler
            .add_step(url("https://example.com/2"), 2, None, Properties::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_step_rejects_unsupported_scheme() {
        let crawler = test_coordinator();
        assert!(!crawler
            .add_step(url("ftp://example.com/file"), 0, None, Properties::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_include_overrides_exclude() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .include(Arc::new(DomainFilter::new(&["docs.example.com"])))
            .exclude(Arc::new(DomainFilter::new(&["*.example.com"])))
            .build()
            .unwrap();

        assert!(crawler
            .add_step(url("https://docs.example.com/"), 1, None, Properties::new())
            .await
            .unwrap());
        assert!(!crawler
            .add_step(url("https://blog.example.com/"), 1, None, Properties::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_external_marking_relative_to_seeds() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .seeds(["https://www.example.com/"])
            .build()
            .unwrap();

        crawler
            .add_step(url("https://example.com/in"), 1, None, Properties::new())
            .await
            .unwrap();
        crawler
            .add_step(url("https://other.com/out"), 1, None, Properties::new())
            .await
            .unwrap();

        let mut external = Vec::new();
        while let Some(entry) = crawler.inner.queue.pop().unwrap() {
            external.push((entry.step().uri().path().to_string(), entry.step().is_external()));
        }
        external.sort();
        assert_eq!(
            external,
            vec![("/in".to_string(), false), ("/out".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_external_host_filter_as_exclude() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .exclude(Arc::new(ExternalHostFilter::for_seeds(&[url("https://example.com/")])))
            .build()
            .unwrap();

        assert!(!crawler
            .add_step(url("https://other.com/"), 1, None, Properties::new())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_crawl_twice_fails() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .seeds(["https://example.com/"])
            .build()
            .unwrap();

        crawler.crawl().await.unwrap();
        assert!(matches!(crawler.crawl().await, Err(RippleError::AlreadyUsed)));
    }

    #[tokio::test]
    async fn test_cancel_twice_fails() {
        let crawler = test_coordinator();
        crawler.cancel().unwrap();
        assert!(matches!(crawler.cancel(), Err(RippleError::AlreadyCancelled)));
    }

    #[tokio::test]
    async fn test_no_accepted_seed_stops_immediately() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .seeds(["https://example.com/"])
            .exclude(Arc::new(DomainFilter::new(&["example.com"])))
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();
        assert_eq!(stats.stop_reason, Some(StopReason::SeedRejected));
        assert_eq!(stats.downloads_started, 0);
        assert_eq!(stats.phase, CrawlPhase::Completed);
    }

    #[tokio::test]
    async fn test_cancel_before_crawl_downloads_nothing() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .seeds(["https://example.com/"])
            .build()
            .unwrap();

        crawler.cancel().unwrap();
        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.stop_reason, Some(StopReason::Cancelled));
        assert_eq!(stats.downloads_started, 0);
        assert_eq!(stats.queued_remaining, 1);
    }

    #[tokio::test]
    async fn test_download_errors_stop_crawl() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::failing(|entry| DownloadError::Timeout {
                url: entry.step().uri().to_string(),
            })))
            .seeds([
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
            ])
            .max_concurrent_downloads(1)
            .max_download_errors(Some(2))
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.download_errors, 2);
        assert_eq!(stats.queued_remaining, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::MaxDownloadErrors));
        assert_eq!(crawler.phase(), CrawlPhase::Completed);
    }

    #[tokio::test]
    async fn test_max_downloads_caps_dispatch() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::ok()))
            .seeds([
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
            ])
            .max_concurrent_downloads(1)
            .max_downloads(Some(2))
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.downloads_completed, 2);
        assert_eq!(stats.pages_crawled, 2);
        assert_eq!(stats.stop_reason, Some(StopReason::MaxDownloads));
    }

    #[tokio::test]
    async fn test_max_crawl_time_stops_crawl() {
        let crawler = Coordinator::builder()
            .downloader(Arc::new(SlowDownloader::new(Duration::from_millis(200))))
            .seeds(seeds("page", 10))
            .max_concurrent_downloads(2)
            .max_crawl_time(Some(Duration::from_millis(300)))
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.stop_reason, Some(StopReason::MaxCrawlTime));
        assert_eq!(stats.phase, CrawlPhase::Completed);
        assert!(stats.downloads_completed < 10);
        assert!(stats.queued_remaining > 0);
        assert_eq!(stats.downloads_started, stats.downloads_completed);
    }

    #[tokio::test]
    async fn test_cancel_mid_crawl_drains_in_flight_downloads() {
        let events = Arc::new(EventLog::default());
        let crawler = Coordinator::builder()
            .downloader(Arc::new(SlowDownloader::new(Duration::from_millis(150))))
            .seeds(seeds("page", 20))
            .max_concurrent_downloads(3)
            .observer(events.clone())
            .build()
            .unwrap();

        let running = {
            let crawler = crawler.clone();
            tokio::spawn(async move { crawler.crawl().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        crawler.cancel().unwrap();

        let stats = running.await.unwrap().unwrap();

        assert_eq!(stats.downloads_started, 3);
        assert_eq!(stats.downloads_completed, 3);
        assert_eq!(stats.queued_remaining, 17);
        assert_eq!(stats.stop_reason, Some(StopReason::Cancelled));
        assert_eq!(stats.phase, CrawlPhase::Completed);
        assert_eq!(EventLog::count(&events.cancelled), 1);
        assert_eq!(EventLog::count(&events.finished), 0);
    }

    #[tokio::test]
    async fn test_download_error_limit_lets_in_flight_downloads_finish() {
        // LIFO: the failing seed is popped first, alongside two slow ones
        let crawler = Coordinator::builder()
            .downloader(Arc::new(
                SlowDownloader::new(Duration::from_millis(100)).failing_paths("/fail"),
            ))
            .seeds([
                "https://example.com/slow1",
                "https://example.com/slow2",
                "https://example.com/slow3",
                "https://example.com/fail",
            ])
            .max_concurrent_downloads(3)
            .max_download_errors(Some(1))
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.downloads_started, 3);
        assert_eq!(stats.download_errors, 1);
        assert_eq!(stats.downloads_completed, 2);
        assert_eq!(stats.queued_remaining, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::MaxDownloadErrors));
        assert_eq!(stats.phase, CrawlPhase::Completed);
    }

    #[tokio::test]
    async fn test_panicking_downloader_is_reported_as_download_error() {
        let events = Arc::new(EventLog::default());
        let crawler = Coordinator::builder()
            .downloader(Arc::new(StaticDownloader::panicking()))
            .seeds(seeds("page", 2))
            .observer(events.clone())
            .build()
            .unwrap();

        let stats = crawler.crawl().await.unwrap();

        assert_eq!(stats.download_errors, 2);
        assert_eq!(stats.downloads_completed, 0);
        assert_eq!(stats.queued_remaining, 0);
        assert_eq!(stats.phase, CrawlPhase::Completed);
        assert_eq!(EventLog::count(&events.download_errors), 2);
        assert_eq!(EventLog::count(&events.finished), 1);
    }
}
