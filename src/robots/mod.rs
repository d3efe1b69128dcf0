//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! The coordinator consults a [`RobotsPolicy`] before queueing a URL that no
//! include filter admitted.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Decides whether robots rules permit fetching a URL
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn is_allowed(&self, url: &Url) -> bool;
}

/// Fetches robots.txt for an origin
///
/// A missing file, an error status, or a transport failure all mean
/// "no restrictions".
///
/// # Arguments
///
/// * `client` - The HTTP client to fetch with
/// * `origin` - Scheme, host and port, e.g. `https://example.com`
/// * `timeout` - Upper bound on the whole request
///
/// # Returns
///
/// The parsed rules, or [`ParsedRobots::allow_all`] when there are none
pub async fn fetch_robots(client: &Client, origin: &str, timeout: Duration) -> ParsedRobots {
    let url = format!("{}/robots.txt", origin);

    let response = match client.get(&url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", url, e);
            return ParsedRobots::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!("No robots.txt at {} ({})", url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read {}: {}", url, e);
            ParsedRobots::allow_all()
        }
    }
}
