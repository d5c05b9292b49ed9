//! Expiring cache of robots.txt bodies
//!
//! Bodies are cached per robots-URL with a TTL (default one hour). A miss
//! is distinct from a cached empty body: an empty string means "fetched,
//! no restrictions" and stays valid until it expires.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default body lifetime: one hour
pub const DEFAULT_CACHE_TIME: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct CachedBody {
    body: String,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CachedBody {
    fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > self.ttl
    }
}

/// Mapping from robots-URL to cached body with per-entry expiry
///
/// Safe for concurrent use; on a race between two refetches of the same
/// origin, last writer wins, which costs at most one wasted fetch per
/// origin per cache window.
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedBody>>,
    ttl: Duration,
}

impl RobotsCache {
    /// Creates a cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TIME)
    }

    /// Creates a cache whose entries expire after `ttl`
    pub fn with_ttl(ttl: std::time::Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::hours(1)),
        }
    }

    /// Returns the cached body for a robots-URL, or `None` on a miss
    ///
    /// Expired entries are evicted and reported as misses.
    pub fn get(&self, robots_url: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(robots_url) {
            Some(cached) if !cached.is_stale() => Some(cached.body.clone()),
            Some(_) => {
                entries.remove(robots_url);
                None
            }
            None => None,
        }
    }

    /// Stores a body for a robots-URL with the cache's TTL
    pub fn set(&self, robots_url: impl Into<String>, body: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            robots_url.into(),
            CachedBody {
                body: body.into(),
                fetched_at: Utc::now(),
                ttl: self.ttl,
            },
        );
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_on_empty_cache() {
        let cache = RobotsCache::new();
        assert_eq!(cache.get("http://example.com/robots.txt"), None);
    }

    #[test]
    fn test_set_then_get() {
        let cache = RobotsCache::new();
        cache.set("http://example.com/robots.txt", "User-agent: *\nAllow: /");
        assert_eq!(
            cache.get("http://example.com/robots.txt").as_deref(),
            Some("User-agent: *\nAllow: /")
        );
    }

    #[test]
    fn test_empty_body_is_a_hit() {
        let cache = RobotsCache::new();
        cache.set("http://example.com/robots.txt", "");
        // "no restrictions" is cached content, not a miss
        assert_eq!(cache.get("http://example.com/robots.txt").as_deref(), Some(""));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = RobotsCache::new();
        cache.set("http://example.com/robots.txt", "body");

        // Rewind fetched_at to two hours ago
        {
            let mut entries = cache.entries.lock().unwrap();
            let cached = entries.get_mut("http://example.com/robots.txt").unwrap();
            cached.fetched_at = Utc::now() - Duration::hours(2);
        }

        assert_eq!(cache.get("http://example.com/robots.txt"), None);
    }

    #[test]
    fn test_fresh_entry_is_not_stale() {
        let cache = RobotsCache::with_ttl(std::time::Duration::from_secs(3600));
        cache.set("http://example.com/robots.txt", "body");

        // Just under the TTL
        {
            let mut entries = cache.entries.lock().unwrap();
            let cached = entries.get_mut("http://example.com/robots.txt").unwrap();
            cached.fetched_at = Utc::now() - Duration::minutes(59);
        }

        assert!(cache.get("http://example.com/robots.txt").is_some());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = RobotsCache::new();
        cache.set("http://example.com/robots.txt", "first");
        cache.set("http://example.com/robots.txt", "second");
        assert_eq!(
            cache.get("http://example.com/robots.txt").as_deref(),
            Some("second")
        );
    }
}
