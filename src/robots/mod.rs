//! Robots.txt retrieval policy and caching
//!
//! The engine consults one robots body per origin. This module derives the
//! canonical robots URL for a target, evaluates a fetched body against a
//! user agent, and caches bodies with a TTL so an origin is fetched at most
//! once per cache window.

mod cache;

pub use cache::{RobotsCache, DEFAULT_CACHE_TIME};

use robotstxt::DefaultMatcher;
use url::Url;

/// Derives the canonical robots URL for a target: scheme + host + port
/// + `/robots.txt`
///
/// Returns `None` for URLs without a host (e.g. `data:` URLs), which the
/// engine treats as having no robots policy.
pub fn robots_url_for(target: &Url) -> Option<Url> {
    target.host_str()?;
    let mut robots = target.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}

/// A robots.txt body ready for allow/deny evaluation
///
/// An empty body imposes no restrictions; this is also the permissive
/// fallback when a robots fetch fails in a non-blocking way.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    body: String,
}

impl RobotsPolicy {
    /// Wraps a raw robots.txt body
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// A policy that allows everything
    pub fn allow_all() -> Self {
        Self {
            body: String::new(),
        }
    }

    /// Checks whether `url` is allowed for `user_agent`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.body.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, user_agent, url)
    }
}
