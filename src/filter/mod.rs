//! URL admission filters
//!
//! Filters decide which discovered URLs may enter the queue:
//! - include filters admit a URL outright, even past robots.txt
//! - exclude filters reject a URL unless an include filter admitted it
//! - anything neither includes nor excludes falls through to robots.txt
//!
//! Any `Fn(&Url, Option<&CrawlStep>) -> bool` closure is a filter.

use crate::crawler::CrawlStep;
use crate::url::site_host;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// A predicate over a candidate URL and the step that linked to it
pub trait UrlFilter: Send + Sync {
    fn matches(&self, url: &Url, referrer: Option<&CrawlStep>) -> bool;
}

impl<F> UrlFilter for F
where
    F: Fn(&Url, Option<&CrawlStep>) -> bool + Send + Sync,
{
    fn matches(&self, url: &Url, referrer: Option<&CrawlStep>) -> bool {
        self(url, referrer)
    }
}

/// Checks if a domain matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Examples
///
/// ```
/// use ripple_engine::filter::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Matches URLs whose host fits any of a list of domain patterns
#[derive(Debug, Clone)]
pub struct DomainFilter {
    patterns: Vec<String>,
}

impl DomainFilter {
    /// Creates a filter from patterns such as `example.com` or `*.example.com`
    ///
    /// Patterns and hosts are compared in lowercase.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl UrlFilter for DomainFilter {
    fn matches(&self, url: &Url, _referrer: Option<&CrawlStep>) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.patterns.iter().any(|p| matches_wildcard(p, &host))
    }
}

/// Matches URLs that live outside a fixed set of site hosts
///
/// Hosts are compared with any leading `www.` removed, so
/// `www.example.com` and `example.com` are the same site.
#[derive(Debug, Clone, Default)]
pub struct ExternalHostFilter {
    hosts: HashSet<String>,
}

impl ExternalHostFilter {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| {
                    let h = h.as_ref().to_lowercase();
                    h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
                })
                .collect(),
        }
    }

    /// Treats every host outside the seeds' hosts as external
    pub fn for_seeds(seeds: &[Url]) -> Self {
        Self {
            hosts: seeds.iter().filter_map(site_host).collect(),
        }
    }

    /// True when `url` is on one of the configured hosts
    pub fn is_internal(&self, url: &Url) -> bool {
        site_host(url).map_or(false, |h| self.hosts.contains(&h))
    }
}

impl UrlFilter for ExternalHostFilter {
    fn matches(&self, url: &Url, _referrer: Option<&CrawlStep>) -> bool {
        !self.is_internal(url)
    }
}

/// Outcome of running a URL past the include and exclude filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// An include filter matched
    Include,
    /// An exclude filter matched and no include filter did
    Exclude,
    /// No filter had an opinion
    Undecided,
}

/// Ordered include and exclude filter lists
#[derive(Clone, Default)]
pub struct FilterSet {
    include: Vec<Arc<dyn UrlFilter>>,
    exclude: Vec<Arc<dyn UrlFilter>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(&mut self, filter: Arc<dyn UrlFilter>) {
        self.include.push(filter);
    }

    pub fn exclude(&mut self, filter: Arc<dyn UrlFilter>) {
        self.exclude.push(filter);
    }

    /// Include filters are consulted first and win over exclude filters
    pub fn evaluate(&self, url: &Url, referrer: Option<&CrawlStep>) -> FilterVerdict {
        if self.include.iter().any(|f| f.matches(url, referrer)) {
            FilterVerdict::Include
        } else if self.exclude.iter().any(|f| f.matches(url, referrer)) {
            FilterVerdict::Exclude
        } else {
            FilterVerdict::Undecided
        }
    }
}
