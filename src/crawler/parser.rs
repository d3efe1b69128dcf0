//! HTML parser for extracting links and metadata, plus the built-in
//! pipeline steps that use it
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title
//!
//! [`LinkExtractor`] feeds the extracted links back to the coordinator one
//! level deeper; [`StatusReporter`] stops error pages before they get there.

use crate::crawler::pipeline::{Flow, PipelineStep, StepContext};
use crate::crawler::result::FetchResult;
use crate::crawler::step::Properties;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute http(s) URL
    pub url: Url,

    /// The href attribute as written in the page
    pub href: String,

    /// Anchor text, whitespace-collapsed (empty for canonical links)
    pub text: String,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All followable links, in document order
    pub links: Vec<DiscoveredLink>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Relative links resolve against `<base href>` when the page has one.
///
/// # Example
///
/// ```
/// use ripple_engine::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url.as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, &base_url),
    }
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<DiscoveredLink> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, base_url) {
                    let text = element
                        .text()
                        .flat_map(str::split_whitespace)
                        .collect::<Vec<_>>()
                        .join(" ");
                    links.push(DiscoveredLink {
                        url,
                        href: href.to_string(),
                        text,
                    });
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, base_url) {
                    links.push(DiscoveredLink {
                        url,
                        href: href.to_string(),
                        text: String::new(),
                    });
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then_some(absolute_url)
}

/// Pipeline step that queues every link on an HTML page
///
/// Sets [`FetchResult::title`] and adds each link at the current depth + 1,
/// with the raw href as the `link_text` property and the anchor text as
/// `anchor_text`. The number of links that made it into the queue is stored
/// in the result's `links_queued` property.
#[derive(Debug, Clone, Default)]
pub struct LinkExtractor {
    timeout: Option<Duration>,
}

impl LinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PipelineStep for LinkExtractor {
    fn name(&self) -> &str {
        "link-extractor"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn process(&self, ctx: &StepContext<'_>, result: &mut FetchResult) -> anyhow::Result<Flow> {
        if !result.is_html() {
            return Ok(Flow::Continue);
        }

        let Some(html) = result.body_text()? else {
            return Ok(Flow::Continue);
        };

        let parsed = parse_html(&html, &result.response_url);
        result.title = parsed.title;

        let referrer = result.step().clone();
        let depth = referrer.depth() + 1;
        let mut queued = 0u64;

        for link in parsed.links {
            if ctx.is_cancelled() {
                break;
            }

            let mut properties = Properties::new();
            properties.insert("link_text".to_string(), link.href.into());
            properties.insert("anchor_text".to_string(), link.text.into());

            if ctx
                .crawler()
                .add_step(link.url, depth, Some(&referrer), properties)
                .await?
            {
                queued += 1;
            }
        }

        tracing::debug!("Queued {} links from {}", queued, referrer.uri());
        result
            .properties
            .insert("links_queued".to_string(), queued.into());

        Ok(Flow::Continue)
    }
}

/// Pipeline step that reports non-2xx responses as broken links
///
/// Error pages halt the pipeline so later steps only see successes.
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    timeout: Option<Duration>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PipelineStep for StatusReporter {
    fn name(&self) -> &str {
        "status-reporter"
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn process(&self, _ctx: &StepContext<'_>, result: &mut FetchResult) -> anyhow::Result<Flow> {
        if result.is_success() {
            return Ok(Flow::Continue);
        }

        match result.referrer() {
            Some(referrer) => tracing::warn!(
                "Broken link {} -> {} ({})",
                referrer.uri(),
                result.step().uri(),
                result.status
            ),
            None => tracing::warn!("Seed {} returned {}", result.step().uri(), result.status),
        }

        Ok(Flow::Halt)
    }
}
