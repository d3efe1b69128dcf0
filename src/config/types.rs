use serde::Deserialize;

/// Main configuration structure for Ripple Engine
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub url: UrlConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Crawl limits and seeding
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URLs the crawl starts from (depth 0)
    pub seeds: Vec<String>,

    /// Maximum number of downloads in flight at once
    #[serde(rename = "max-concurrent-downloads", default = "default_concurrency")]
    pub max_concurrent_downloads: u32,

    /// Maximum link distance from a seed; unlimited when absent
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Maximum number of crawled pages before the crawl stops
    #[serde(rename = "max-downloads", default)]
    pub max_downloads: Option<u64>,

    /// Number of failed downloads after which the crawl stops
    #[serde(rename = "max-download-errors", default)]
    pub max_download_errors: Option<u64>,

    /// Wall-clock limit for the whole crawl (seconds)
    #[serde(rename = "max-crawl-time", default)]
    pub max_crawl_time: Option<u64>,

    /// Order in which queued entries are popped
    #[serde(rename = "queue-order", default)]
    pub queue_order: QueueOrder,

    /// Time bound applied to each built-in pipeline step (milliseconds)
    #[serde(rename = "step-timeout", default)]
    pub step_timeout: Option<u64>,
}

/// Order in which a queue store hands out pending entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    /// Most recently pushed entry first (depth-first flavoured)
    #[default]
    Lifo,
    /// Oldest entry first (breadth-first flavoured)
    Fifo,
}

/// HTTP download behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// TCP/TLS connect timeout (milliseconds)
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Maximum wait for response headers or for the next body chunk (milliseconds)
    #[serde(rename = "read-timeout", default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Extra attempts after the first failed one
    #[serde(rename = "retry-count", default = "default_retry_count")]
    pub retry_count: u32,

    /// Pause between attempts (milliseconds)
    #[serde(rename = "retry-delay", default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Bodies larger than this are discarded (bytes)
    #[serde(rename = "max-content-size", default)]
    pub max_content_size: Option<u64>,

    /// Bodies up to this size are kept in memory, larger ones go to a temp file (bytes)
    #[serde(rename = "max-in-memory-size", default = "default_max_in_memory_size")]
    pub max_in_memory_size: u64,

    /// Keep a cookie jar across requests
    #[serde(rename = "use-cookies", default = "default_true")]
    pub use_cookies: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            retry_count: default_retry_count(),
            retry_delay: default_retry_delay(),
            max_content_size: None,
            max_in_memory_size: default_max_in_memory_size(),
            use_cookies: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// URL components that participate in the dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlComponent {
    Scheme,
    Host,
    Port,
    Path,
    Query,
    Fragment,
}

/// Dedup key configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UrlConfig {
    #[serde(default = "default_components")]
    pub components: Vec<UrlComponent>,

    #[serde(rename = "case-sensitive-path", default = "default_true")]
    pub case_sensitive_path: bool,

    #[serde(rename = "strip-tracking-params", default)]
    pub strip_tracking_params: bool,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            components: default_components(),
            case_sensitive_path: true,
            strip_tracking_params: false,
        }
    }
}

/// Include/exclude rules applied to every discovered URL
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Domain patterns that are always admitted (e.g. "*.example.com")
    #[serde(default)]
    pub include: Vec<String>,

    /// Domain patterns that are never admitted
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Follow links leaving the seed hosts
    #[serde(rename = "follow-external", default = "default_true")]
    pub follow_external: bool,

    /// Consult robots.txt before queueing
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            follow_external: true,
            respect_robots: true,
        }
    }
}

/// Where the history and queue live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file (sqlite backend only)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

fn default_concurrency() -> u32 {
    4
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_read_timeout() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1_000
}

fn default_max_in_memory_size() -> u64 {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_components() -> Vec<UrlComponent> {
    vec![
        UrlComponent::Host,
        UrlComponent::Port,
        UrlComponent::Path,
        UrlComponent::Query,
    ]
}
