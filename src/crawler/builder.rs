//! Fluent construction of a [`Coordinator`]
//!
//! ```no_run
//! use std::sync::Arc;
//! use ripple_engine::config::{DownloadConfig, UserAgentConfig};
//! use ripple_engine::crawler::{Coordinator, HttpDownloader, LinkExtractor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = UserAgentConfig {
//!     crawler_name: "RippleBot".to_string(),
//!     crawler_version: "1.0".to_string(),
//!     contact_url: "https://example.com/about".to_string(),
//!     contact_email: "admin@example.com".to_string(),
//! };
//!
//! let crawler = Coordinator::builder()
//!     .seeds(["https://example.com/"])
//!     .max_depth(Some(2))
//!     .downloader(Arc::new(HttpDownloader::new(&agent, &DownloadConfig::default())?))
//!     .pipeline_step(Arc::new(LinkExtractor::new()))
//!     .build()?;
//!
//! let stats = crawler.crawl().await?;
//! println!("{} pages", stats.downloads_completed);
//! # Ok(())
//! # }
//! ```

use crate::config::QueueOrder;
use crate::crawler::concurrency::CompletionSignal;
use crate::crawler::coordinator::{Coordinator, CrawlSettings, Inner};
use crate::crawler::downloader::Downloader;
use crate::crawler::events::{CrawlObserver, ObserverRegistry};
use crate::crawler::pipeline::{PipelineRunner, PipelineStep};
use crate::crawler::stats::CrawlCounters;
use crate::filter::{ExternalHostFilter, FilterSet, UrlFilter};
use crate::robots::RobotsPolicy;
use crate::state::PhaseCell;
use crate::storage::{HistoryStore, MemoryHistory, MemoryQueue, QueueStore};
use crate::url::{site_host, UrlSensitivity};
use crate::{ConfigError, RippleError};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use url::Url;

/// Builder for [`Coordinator`]
///
/// Only the downloader is required. History and queue default to in-memory
/// stores (LIFO), and there are no filters, robots policy, pipeline steps
/// or observers unless added.
pub struct CoordinatorBuilder {
    settings: CrawlSettings,
    seeds: Vec<String>,
    downloader: Option<Arc<dyn Downloader>>,
    history: Option<Arc<dyn HistoryStore>>,
    queue: Option<Arc<dyn QueueStore>>,
    pipeline: PipelineRunner,
    observers: ObserverRegistry,
    filters: FilterSet,
    follow_external: bool,
    robots: Option<Arc<dyn RobotsPolicy>>,
    sensitivity: UrlSensitivity,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            settings: CrawlSettings::default(),
            seeds: Vec::new(),
            downloader: None,
            history: None,
            queue: None,
            pipeline: PipelineRunner::new(),
            observers: ObserverRegistry::new(),
            filters: FilterSet::new(),
            follow_external: true,
            robots: None,
            sensitivity: UrlSensitivity::default(),
        }
    }

    /// Replaces all limits at once
    pub fn settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds.extend(seeds.into_iter().map(Into::into));
        self
    }

    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.settings.max_concurrent_downloads = limit;
        self
    }

    pub fn max_depth(mut self, depth: Option<u32>) -> Self {
        self.settings.max_depth = depth;
        self
    }

    pub fn max_downloads(mut self, limit: Option<u64>) -> Self {
        self.settings.max_downloads = limit;
        self
    }

    pub fn max_download_errors(mut self, limit: Option<u64>) -> Self {
        self.settings.max_download_errors = limit;
        self
    }

    pub fn max_crawl_time(mut self, limit: Option<Duration>) -> Self {
        self.settings.max_crawl_time = limit;
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn QueueStore>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Appends a step to the pipeline; steps run in the order added
    pub fn pipeline_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.pipeline.push(step);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observers.register(observer);
        self
    }

    /// Adds a filter that admits matching URLs, overriding excludes and robots.txt
    pub fn include(mut self, filter: Arc<dyn UrlFilter>) -> Self {
        self.filters.include(filter);
        self
    }

    /// Adds a filter that rejects matching URLs
    pub fn exclude(mut self, filter: Arc<dyn UrlFilter>) -> Self {
        self.filters.exclude(filter);
        self
    }

    /// When false, URLs off the seed hosts are excluded
    pub fn follow_external(mut self, follow: bool) -> Self {
        self.follow_external = follow;
        self
    }

    pub fn robots(mut self, robots: Arc<dyn RobotsPolicy>) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn url_sensitivity(mut self, sensitivity: UrlSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Validates the settings and seeds and builds the coordinator
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to `crawl()`
    /// * `Err(RippleError::InvalidSeed)` - A seed is not an absolute http(s) URL
    /// * `Err(RippleError::Config)` - Missing downloader or a zero limit
    pub fn build(mut self) -> Result<Coordinator, RippleError> {
        if self.settings.max_concurrent_downloads == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_downloads must be greater than 0".to_string(),
            )
            .into());
        }

        let downloader = self.downloader.take().ok_or_else(|| {
            ConfigError::Validation("Coordinator must have a downloader".to_string())
        })?;

        let seeds = self
            .seeds
            .iter()
            .map(|seed| parse_seed(seed))
            .collect::<Result<Vec<_>, _>>()?;
        let seed_hosts = seeds.iter().filter_map(site_host).collect();

        if !self.follow_external {
            self.filters
                .exclude(Arc::new(ExternalHostFilter::for_seeds(&seeds)));
        }

        Ok(Coordinator::from_inner(Inner {
            settings: self.settings,
            seeds,
            seed_hosts,
            history: self
                .history
                .unwrap_or_else(|| Arc::new(MemoryHistory::new())),
            queue: self
                .queue
                .unwrap_or_else(|| Arc::new(MemoryQueue::new(QueueOrder::default()))),
            downloader,
            pipeline: self.pipeline,
            observers: self.observers,
            filters: self.filters,
            robots: self.robots,
            sensitivity: self.sensitivity,
            phase: PhaseCell::new(),
            used: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            counters: CrawlCounters::default(),
            drain_lock: Mutex::new(()),
            drain_requested: AtomicBool::new(false),
            completion: CompletionSignal::new(),
            started_at: OnceLock::new(),
        }))
    }
}

fn parse_seed(seed: &str) -> Result<Url, RippleError> {
    let invalid = |reason: String| RippleError::InvalidSeed {
        url: seed.to_string(),
        reason,
    };

    let url = Url::parse(seed.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
