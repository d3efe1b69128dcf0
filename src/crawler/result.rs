//! The outcome of one download, threaded through the pipeline

use crate::crawler::body::ResponseBody;
use crate::crawler::step::{CrawlStep, Properties, QueueEntry};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::io;
use std::time::Duration;
use url::Url;

/// Result of a download plus the state pipeline steps accumulate on it
///
/// Dropping a `FetchResult` releases its body, deleting any temp file.
#[derive(Debug)]
pub struct FetchResult {
    /// The work item this result was fetched for
    pub entry: QueueEntry,

    /// HTTP status code (non-2xx responses are still results)
    pub status: u16,

    pub headers: HeaderMap,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Character set from the Content-Type parameters
    pub charset: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    /// e.g. "HTTP/1.1"
    pub protocol_version: String,

    /// Final URL after redirects
    pub response_url: Url,

    /// None when there was no body or it exceeded the content size cap
    pub body: Option<Box<dyn ResponseBody>>,

    /// True when the body was dropped for exceeding the content size cap
    pub truncated: bool,

    pub downloaded_at: DateTime<Utc>,

    /// Time from request start to last body byte
    pub elapsed: Duration,

    /// Page title, set by pipeline steps
    pub title: Option<String>,

    /// Extracted text, set by pipeline steps
    pub text: Option<String>,

    /// Free-form values for communication between pipeline steps
    pub properties: Properties,
}

impl FetchResult {
    /// Creates a result with no headers and no body
    ///
    /// The response URL defaults to the requested URL and the properties
    /// start as a copy of the entry's discovery properties.
    pub fn new(entry: QueueEntry, status: u16) -> Self {
        let response_url = entry.step().uri().clone();
        let properties = entry.properties().clone();
        Self {
            entry,
            status,
            headers: HeaderMap::new(),
            content_type: None,
            charset: None,
            last_modified: None,
            protocol_version: "HTTP/1.1".to_string(),
            response_url,
            body: None,
            truncated: false,
            downloaded_at: Utc::now(),
            elapsed: Duration::ZERO,
            title: None,
            text: None,
            properties,
        }
    }

    pub fn with_body(mut self, body: Box<dyn ResponseBody>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.charset = parse_charset(content_type);
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn step(&self) -> &CrawlStep {
        self.entry.step()
    }

    pub fn referrer(&self) -> Option<&CrawlStep> {
        self.entry.referrer()
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the Content-Type names an HTML document
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(false)
    }

    /// Reads the body as text, replacing invalid UTF-8 sequences
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` - The decoded body
    /// * `Ok(None)` - There is no body
    /// * `Err(io::Error)` - The backing store could not be read
    pub fn body_text(&self) -> io::Result<Option<String>> {
        match &self.body {
            Some(body) => {
                let bytes = body.read_all()?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            None => Ok(None),
        }
    }
}

/// Extracts the `charset` parameter from a Content-Type value
pub(crate) fn parse_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_ascii_lowercase())
        } else {
            None
        }
    })
}
