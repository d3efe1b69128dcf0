//! robots.txt rules for one origin
//!
//! Matching is delegated to `robotstxt`, which follows Google's reference
//! parser and skips lines it cannot understand.

use robotstxt::DefaultMatcher;

/// The robots.txt rules of one origin
///
/// `None` means there are no rules to apply: the file was missing, empty, or
/// could not be fetched.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    rules: Option<String>,
}

impl ParsedRobots {
    /// Wraps the body of a fetched robots.txt
    pub fn from_content(content: &str) -> Self {
        let rules = (!content.trim().is_empty()).then(|| content.to_string());
        Self { rules }
    }

    /// Rules that allow every URL
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// True when no rules restrict this origin
    pub fn is_unrestricted(&self) -> bool {
        self.rules.is_none()
    }

    /// Checks `url` (absolute, or a path such as "/page.html") against the
    /// group for `user_agent`, falling back to the `*` group
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match &self.rules {
            Some(rules) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(rules, user_agent, url)
            }
            None => true,
        }
    }
}
