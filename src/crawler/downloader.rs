//! HTTP downloader implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Streaming bodies into memory or a temp file
//! - Enforcing read timeouts and a maximum content size
//! - Retrying transport failures within a fixed budget
//!
//! Non-2xx statuses are not errors here: they come back as a normal
//! [`FetchResult`] so pipeline steps can look at them.

use crate::config::{DownloadConfig, UserAgentConfig};
use crate::crawler::body::BodySpool;
use crate::crawler::result::{parse_charset, FetchResult};
use crate::crawler::step::{CrawlStep, QueueEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Transport-level download failures
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("IO error while buffering {url}: {source}")]
    Io { url: String, source: std::io::Error },

    /// The work item's task panicked, in a custom downloader or an observer
    #[error("Task for {url} panicked: {message}")]
    Panicked { url: String, message: String },
}

impl DownloadError {
    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }

    fn io(url: &str, error: std::io::Error) -> Self {
        Self::Io {
            url: url.to_string(),
            source: error,
        }
    }

    /// Returns true if another attempt might succeed
    ///
    /// Request-building failures and redirect-limit violations are permanent;
    /// timeouts, connection failures, broken bodies and local I/O errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Io { .. } => true,
            Self::Http { source, .. } => !(source.is_builder() || source.is_redirect()),
            Self::Panicked { .. } => false,
        }
    }
}

/// Something that turns a queue entry into a fetch result
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, entry: &QueueEntry) -> Result<FetchResult, DownloadError>;
}

/// Attempt budget for one download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first (total attempts = retry_count + 1)
    pub retry_count: u32,
    /// Pause before each extra attempt
    pub retry_delay: Duration,
}

impl From<&DownloadConfig> for RetryPolicy {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay),
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or the budget is spent
///
/// `op` receives the zero-based attempt number.
///
/// # Returns
///
/// The first success, or the last error once attempts are exhausted
pub async fn retry_with<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.retry_count => {
                attempt += 1;
                tracing::debug!(
                    "Attempt {} of {} failed: {}",
                    attempt,
                    policy.retry_count + 1,
                    e
                );
                if !policy.retry_delay.is_zero() {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Formats the user agent string sent with every request
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// No overall request timeout is set; the downloader bounds each wait for
/// headers and each body chunk with the read timeout instead.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `download` - Timeouts and cookie policy
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_engine::config::{DownloadConfig, UserAgentConfig};
/// use ripple_engine::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "RippleBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, &DownloadConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    download: &DownloadConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(user_agent))
        .connect_timeout(Duration::from_millis(download.connect_timeout))
        .cookie_store(download.use_cookies)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Progress callback: (step, zero-based attempt, bytes received so far)
pub type ProgressCallback = Arc<dyn Fn(&CrawlStep, u32, u64) + Send + Sync>;

/// reqwest-backed [`Downloader`]
pub struct HttpDownloader {
    client: Client,
    read_timeout: Duration,
    retry: RetryPolicy,
    max_content_size: Option<u64>,
    max_in_memory_size: u64,
    progress: Option<ProgressCallback>,
}

impl HttpDownloader {
    /// Creates a downloader with its own HTTP client
    pub fn new(user_agent: &UserAgentConfig, config: &DownloadConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, config)?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a downloader around an existing client
    pub fn with_client(client: Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            read_timeout: Duration::from_millis(config.read_timeout),
            retry: RetryPolicy::from(config),
            max_content_size: config.max_content_size,
            max_in_memory_size: config.max_in_memory_size,
            progress: None,
        }
    }

    /// Registers a callback invoked after every received chunk
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Performs one attempt: request, headers, streamed body
    async fn attempt(&self, entry: &QueueEntry, attempt: u32) -> Result<FetchResult, DownloadError> {
        let step = entry.step();
        let url = step.uri().as_str();
        let started = Instant::now();

        tracing::debug!("Fetching {} (attempt {})", url, attempt + 1);

        let mut response = match timeout(self.read_timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(DownloadError::from_reqwest(url, e)),
            Err(_) => {
                return Err(DownloadError::Timeout {
                    url: url.to_string(),
                })
            }
        };

        let mut result = FetchResult::new(entry.clone(), response.status().as_u16());
        result.headers = response.headers().clone();
        result.protocol_version = format!("{:?}", response.version());
        result.response_url = response.url().clone();
        result.content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        result.charset = result.content_type.as_deref().and_then(parse_charset);
        result.last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let declared_len = response.content_length();
        if let (Some(max), Some(len)) = (self.max_content_size, declared_len) {
            if len > max {
                tracing::info!(
                    "Skipping body of {}: declared {} bytes exceeds limit of {}",
                    url,
                    len,
                    max
                );
                result.truncated = true;
                result.elapsed = started.elapsed();
                return Ok(result);
            }
        }

        let mut spool =
            BodySpool::new(declared_len, self.max_in_memory_size).map_err(|e| DownloadError::io(url, e))?;

        loop {
            let chunk = match timeout(self.read_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(DownloadError::from_reqwest(url, e)),
                Err(_) => {
                    return Err(DownloadError::Timeout {
                        url: url.to_string(),
                    })
                }
            };

            if let Some(max) = self.max_content_size {
                if spool.len() + chunk.len() as u64 > max {
                    tracing::info!(
                        "Discarding body of {}: exceeded limit of {} bytes",
                        url,
                        max
                    );
                    result.truncated = true;
                    break;
                }
            }

            spool
                .write(&chunk)
                .map_err(|e| DownloadError::io(url, e))?;

            if let Some(progress) = &self.progress {
                progress(step, attempt, spool.len());
            }
        }

        if !result.truncated {
            let body = spool.finish().map_err(|e| DownloadError::io(url, e))?;
            result.body = Some(body);
        }

        result.downloaded_at = Utc::now();
        result.elapsed = started.elapsed();

        tracing::debug!(
            "Fetched {} -> {} in {:?}",
            url,
            result.status,
            result.elapsed
        );

        Ok(result)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, entry: &QueueEntry) -> Result<FetchResult, DownloadError> {
        retry_with(&self.retry, |attempt| self.attempt(entry, attempt)).await
    }
}
