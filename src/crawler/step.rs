//! Work items: what to fetch, how deep it is, and who found it

use crate::UrlError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use url::Url;

/// Ordered metadata carried from link discovery to pipeline execution
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One page to visit
///
/// Equality, ordering and hashing look at the URL only, compared without its
/// scheme and ignoring case. Depth and the two flags do not participate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStep {
    uri: Url,
    depth: u32,
    is_allowed: bool,
    is_external: bool,
}

impl CrawlStep {
    /// Creates a step for an absolute http(s) URL
    ///
    /// # Arguments
    ///
    /// * `uri` - The URL to fetch
    /// * `depth` - Link distance from the seed (seeds are depth 0)
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStep)` - With `is_allowed = true` and `is_external = false`
    /// * `Err(UrlError)` - Unsupported scheme or missing host
    pub fn new(uri: Url, depth: u32) -> Result<Self, UrlError> {
        if uri.scheme() != "http" && uri.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                uri.scheme()
            )));
        }

        if uri.host_str().is_none() {
            return Err(UrlError::MissingDomain);
        }

        Ok(Self {
            uri,
            depth,
            is_allowed: true,
            is_external: false,
        })
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// False when the step is fetched without counting as a crawled page
    pub fn is_allowed(&self) -> bool {
        self.is_allowed
    }

    /// True when the URL lives outside the seed hosts
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Sets the admission flags; called once by the coordinator before enqueue
    pub(crate) fn mark(&mut self, is_allowed: bool, is_external: bool) {
        self.is_allowed = is_allowed;
        self.is_external = is_external;
    }

    fn identity(&self) -> String {
        let full = self.uri.as_str();
        let without_scheme = full
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(full);
        without_scheme.to_lowercase()
    }
}

impl PartialEq for CrawlStep {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for CrawlStep {}

impl Hash for CrawlStep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for CrawlStep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CrawlStep {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

/// A pending unit of work: a step, the page that linked to it, and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    step: CrawlStep,
    referrer: Option<CrawlStep>,
    #[serde(default)]
    properties: Properties,
}

impl QueueEntry {
    pub fn new(step: CrawlStep, referrer: Option<CrawlStep>, properties: Properties) -> Self {
        Self {
            step,
            referrer,
            properties,
        }
    }

    pub fn step(&self) -> &CrawlStep {
        &self.step
    }

    pub fn referrer(&self) -> Option<&CrawlStep> {
        self.referrer.as_ref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
