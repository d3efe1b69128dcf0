//! URL handling module for Ripple Engine
//!
//! This module provides dedup-key construction and the host helpers used to
//! tell same-site links from external ones.
//!
//! The dedup key decides which URLs count as "the same page". Which URL
//! components take part in it is controlled by [`UrlSensitivity`].

mod normalize;

use crate::config::{UrlComponent, UrlConfig};
use url::Url;

pub use normalize::url_key;

/// Returns the lowercase host of a URL with any leading `www.` removed
///
/// Two URLs belong to the same site when their site hosts are equal.
///
/// ```
/// use ripple_engine::url::site_host;
/// use url::Url;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(site_host(&url), Some("example.com".to_string()));
/// ```
pub fn site_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match host.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => host,
    })
}

/// Which parts of a URL participate in its dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlSensitivity {
    pub scheme: bool,
    pub host: bool,
    pub port: bool,
    pub path: bool,
    pub query: bool,
    pub fragment: bool,
    /// When false, "/About" and "/about" produce the same key
    pub case_sensitive_path: bool,
    /// Drop utm_* and similar tracking parameters from the query
    pub strip_tracking_params: bool,
}

impl Default for UrlSensitivity {
    /// Case-insensitive host, case-sensitive path, scheme and fragment ignored
    fn default() -> Self {
        Self {
            scheme: false,
            host: true,
            port: true,
            path: true,
            query: true,
            fragment: false,
            case_sensitive_path: true,
            strip_tracking_params: false,
        }
    }
}

impl From<&UrlConfig> for UrlSensitivity {
    fn from(config: &UrlConfig) -> Self {
        let has = |component: UrlComponent| config.components.contains(&component);
        Self {
            scheme: has(UrlComponent::Scheme),
            host: has(UrlComponent::Host),
            port: has(UrlComponent::Port),
            path: has(UrlComponent::Path),
            query: has(UrlComponent::Query),
            fragment: has(UrlComponent::Fragment),
            case_sensitive_path: config.case_sensitive_path,
            strip_tracking_params: config.strip_tracking_params,
        }
    }
}
