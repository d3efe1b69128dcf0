use crate::url::UrlSensitivity;
use url::{form_urlencoded, Url};

/// List of tracking query parameters removed when tracking stripping is on
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Builds the dedup key for a URL
///
/// # Key Construction
///
/// Only the components enabled in `sensitivity` are written, in URL order:
///
/// 1. Scheme, followed by `://`
/// 2. Host, lowercased, without a leading `www.`
/// 3. Port, only when it differs from the scheme default
/// 4. Path with dot segments and duplicate slashes removed and no trailing
///    slash (except for root `/`); lowercased when the path is case-insensitive
/// 5. Query with parameters sorted by name (tracking parameters dropped when
///    requested); omitted when empty
/// 6. Fragment
///
/// # Arguments
///
/// * `url` - The absolute URL
/// * `sensitivity` - Which components participate
///
/// # Returns
///
/// The dedup key string
///
/// # Examples
///
/// ```
/// use ripple_engine::url::{url_key, UrlSensitivity};
/// use url::Url;
///
/// let url = Url::parse("http://WWW.EXAMPLE.COM/a/../page/?b=2&a=1#top").unwrap();
/// assert_eq!(url_key(&url, &UrlSensitivity::default()), "example.com/page?a=1&b=2");
/// ```
pub fn url_key(url: &Url, sensitivity: &UrlSensitivity) -> String {
    let mut key = String::new();

    if sensitivity.scheme {
        key.push_str(url.scheme());
        key.push_str("://");
    }

    if sensitivity.host {
        if let Some(host) = url.host_str() {
            let host = host.to_lowercase();
            key.push_str(host.strip_prefix("www.").unwrap_or(&host));
        }
    }

    if sensitivity.port {
        // Url::port() is None for the scheme's default port
        if let Some(port) = url.port() {
            key.push(':');
            key.push_str(&port.to_string());
        }
    }

    if sensitivity.path {
        let path = normalize_path(url.path());
        if sensitivity.case_sensitive_path {
            key.push_str(&path);
        } else {
            key.push_str(&path.to_lowercase());
        }
    }

    if sensitivity.query && url.query().is_some() {
        let params = filter_and_sort_query_params(url, sensitivity.strip_tracking_params);
        if !params.is_empty() {
            // Re-encode so a decoded '&' or '=' cannot pose as a separator
            let query_string = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            key.push('?');
            key.push_str(&query_string);
        }
    }

    if sensitivity.fragment {
        if let Some(fragment) = url.fragment() {
            key.push('#');
            key.push_str(fragment);
        }
    }

    key
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Skip empty segments (from multiple slashes) and current directory markers
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Sorts query parameters, optionally dropping tracking parameters
fn filter_and_sort_query_params(url: &Url, strip_tracking: bool) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !(strip_tracking && is_tracking_param(key)))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps repeated keys in their original order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> String {
        url_key(&Url::parse(url).unwrap(), &UrlSensitivity::default())
    }

    fn key_with(url: &str, sensitivity: UrlSensitivity) -> String {
        url_key(&Url::parse(url).unwrap(), &sensitivity)
    }

    #[test]
    fn test_scheme_ignored_by_default() {
        assert_eq!(key("http://example.com/page"), key("https://example.com/page"));
    }

    #[test]
    fn test_scheme_included_when_sensitive() {
        let sensitivity = UrlSensitivity {
            scheme: true,
            ..UrlSensitivity::default()
        };
        assert_eq!(
            key_with("http://example.com/page", sensitivity),
            "http://example.com/page"
        );
        assert_ne!(
            key_with("http://example.com/page", sensitivity),
            key_with("https://example.com/page", sensitivity)
        );
    }

    #[test]
    fn test_remove_www_and_lowercase_host() {
        assert_eq!(key("https://WWW.Example.COM/"), "example.com/");
    }

    #[test]
    fn test_remove_trailing_slash() {
        assert_eq!(key("https://example.com/page/"), "example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        assert_eq!(key("https://example.com"), "example.com/");
    }

    #[test]
    fn test_fragment_ignored_by_default() {
        assert_eq!(key("https://example.com/page#section"), "example.com/page");
    }

    #[test]
    fn test_fragment_included_when_sensitive() {
        let sensitivity = UrlSensitivity {
            fragment: true,
            ..UrlSensitivity::default()
        };
        assert_eq!(
            key_with("https://example.com/page#section", sensitivity),
            "example.com/page#section"
        );
    }

    #[test]
    fn test_path_case_sensitivity() {
        assert_ne!(key("https://example.com/About"), key("https://example.com/about"));

        let insensitive = UrlSensitivity {
            case_sensitive_path: false,
            ..UrlSensitivity::default()
        };
        assert_eq!(
            key_with("https://example.com/About", insensitive),
            key_with("https://example.com/about", insensitive)
        );
    }

    #[test]
    fn test_non_default_port_kept() {
        assert_eq!(key("http://127.0.0.1:8080/x"), "127.0.0.1:8080/x");
        assert_eq!(key("https://example.com:443/x"), "example.com/x");
    }

    #[test]
    fn test_sort_query_params() {
        assert_eq!(
            key("https://example.com/page?b=2&a=1"),
            "example.com/page?a=1&b=2"
        );
    }

    #[test]
    fn test_tracking_params_kept_unless_stripped() {
        assert_eq!(
            key("https://example.com/page?utm_source=twitter"),
            "example.com/page?utm_source=twitter"
        );

        let stripping = UrlSensitivity {
            strip_tracking_params: true,
            ..UrlSensitivity::default()
        };
        assert_eq!(
            key_with(
                "https://example.com/page?keep=yes&utm_medium=email&fbclid=123",
                stripping
            ),
            "example.com/page?keep=yes"
        );
        assert_eq!(
            key_with("https://example.com/page?utm_custom=value", stripping),
            "example.com/page"
        );
    }

    #[test]
    fn test_encoded_separators_stay_distinct() {
        let encoded = key("http://e.test/search?a=1%26b%3D2");
        let literal = key("http://e.test/search?a=1&b=2");

        assert_ne!(encoded, literal);
        assert_eq!(literal, "e.test/search?a=1&b=2");
        assert_eq!(encoded, "e.test/search?a=1%26b%3D2");
    }

    #[test]
    fn test_query_ignored_when_insensitive() {
        let sensitivity = UrlSensitivity {
            query: false,
            ..UrlSensitivity::default()
        };
        assert_eq!(
            key_with("https://example.com/page?id=1", sensitivity),
            key_with("https://example.com/page?id=2", sensitivity)
        );
    }

    #[test]
    fn test_normalize_path_with_dots() {
        assert_eq!(key("https://example.com/a/../b/./c"), "example.com/b/c");
    }

    #[test]
    fn test_multiple_slashes() {
        assert_eq!(
            key("https://example.com///path//to///page"),
            "example.com/path/to/page"
        );
    }

    #[test]
    fn test_parent_directory_at_root() {
        assert_eq!(key("https://example.com/../page"), "example.com/page");
    }
}
