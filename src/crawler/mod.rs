//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Work items and fetch results
//! - HTTP downloading with retry logic and body spooling
//! - The post-download pipeline and its built-in steps
//! - Observer hooks
//! - Overall crawl coordination

mod body;
mod builder;
mod concurrency;
mod coordinator;
mod downloader;
mod events;
mod parser;
mod pipeline;
mod result;
mod stats;
mod step;

#[cfg(test)]
mod testing;

pub use body::{BodySpool, InMemoryBody, ResponseBody, SpooledFileBody};
pub use builder::CoordinatorBuilder;
pub use concurrency::CompletionSignal;
pub use coordinator::{Coordinator, CrawlSettings};
pub use downloader::{
    build_http_client, format_user_agent, retry_with, DownloadError, Downloader, HttpDownloader,
    ProgressCallback, RetryPolicy,
};
pub use events::{CrawlObserver, ObserverRegistry};
pub use parser::{parse_html, DiscoveredLink, LinkExtractor, ParsedPage, StatusReporter};
pub use pipeline::{Flow, PipelineError, PipelineRunner, PipelineStep, StepContext};
pub use result::FetchResult;
pub use stats::CrawlStats;
pub use step::{CrawlStep, Properties, QueueEntry};
