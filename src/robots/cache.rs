//! Robots.txt caching implementation
//!
//! This module provides caching functionality for robots.txt files, including
//! automatic expiration after 24 hours.

use crate::robots::{fetch_robots, ParsedRobots, RobotsPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

/// Cached robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Wraps freshly fetched rules with the current timestamp
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }
}

/// Fetch-on-demand robots.txt policy, one entry per origin
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    timeout: std::time::Duration,
    entries: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt files
    /// * `user_agent` - Product token matched against `User-agent` lines
    /// * `timeout` - Upper bound on one robots.txt fetch
    pub fn new(client: Client, user_agent: &str, timeout: std::time::Duration) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
            timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached origins
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn rules_for(&self, url: &Url) -> CachedRobots {
        let origin = url.origin().ascii_serialization();

        if let Some(cached) = self.entries.read().await.get(&origin) {
            if !cached.is_stale() {
                tracing::debug!("Using cached robots.txt for {}", origin);
                return cached.clone();
            }
        }

        tracing::debug!("Fetching robots.txt for {}", origin);
        let cached = CachedRobots::new(fetch_robots(&self.client, &origin, self.timeout).await);
        self.entries.write().await.insert(origin, cached.clone());
        cached
    }
}

#[async_trait]
impl RobotsPolicy for RobotsCache {
    async fn is_allowed(&self, url: &Url) -> bool {
        self.rules_for(url)
            .await
            .is_allowed(url.as_str(), &self.user_agent)
    }
}
