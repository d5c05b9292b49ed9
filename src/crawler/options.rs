//! Engine configuration
//!
//! Several options accept either a constant or a producer so callers can
//! vary them per request: the inter-request interval may be computed each
//! tick, and the user agent and content-length cap may depend on the URL
//! being fetched.

use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default minimum time between request starts
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of concurrent tick chains
pub const DEFAULT_CONCURRENT_REQUESTS_LIMIT: usize = 5;

/// Default request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An option that is either a constant or computed per URL
pub enum Setting<T> {
    /// The same value for every request
    Fixed(T),

    /// Computed from the URL about to be fetched
    PerUrl(Arc<dyn Fn(&str) -> T + Send + Sync>),
}

impl<T: Clone> Setting<T> {
    /// Resolves the value for a URL
    pub fn resolve(&self, url: &str) -> T {
        match self {
            Setting::Fixed(value) => value.clone(),
            Setting::PerUrl(producer) => producer(url),
        }
    }
}

impl<T> Setting<T> {
    /// Wraps a producer closure
    pub fn per_url(producer: impl Fn(&str) -> T + Send + Sync + 'static) -> Self {
        Setting::PerUrl(Arc::new(producer))
    }
}

impl<T: Clone> Clone for Setting<T> {
    fn clone(&self) -> Self {
        match self {
            Setting::Fixed(value) => Setting::Fixed(value.clone()),
            Setting::PerUrl(producer) => Setting::PerUrl(Arc::clone(producer)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Setting::PerUrl(_) => f.write_str("PerUrl(..)"),
        }
    }
}

impl<T> From<T> for Setting<T> {
    fn from(value: T) -> Self {
        Setting::Fixed(value)
    }
}

/// The inter-request interval: a constant or a zero-argument producer
pub enum IntervalSetting {
    Fixed(Duration),
    Dynamic(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl IntervalSetting {
    /// Wraps a producer closure
    pub fn dynamic(producer: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        IntervalSetting::Dynamic(Arc::new(producer))
    }

    /// The interval to apply right now
    pub fn current(&self) -> Duration {
        match self {
            IntervalSetting::Fixed(interval) => *interval,
            IntervalSetting::Dynamic(producer) => producer(),
        }
    }
}

impl Clone for IntervalSetting {
    fn clone(&self) -> Self {
        match self {
            IntervalSetting::Fixed(interval) => IntervalSetting::Fixed(*interval),
            IntervalSetting::Dynamic(producer) => IntervalSetting::Dynamic(Arc::clone(producer)),
        }
    }
}

impl fmt::Debug for IntervalSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalSetting::Fixed(interval) => f.debug_tuple("Fixed").field(interval).finish(),
            IntervalSetting::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<Duration> for IntervalSetting {
    fn from(interval: Duration) -> Self {
        IntervalSetting::Fixed(interval)
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Minimum time between request starts across all tick chains
    pub interval: IntervalSetting,

    /// Maximum number of in-flight requests
    pub concurrent_requests_limit: usize,

    /// User agent applied to every request and tested against robots.txt
    pub user_agent: Setting<String>,

    /// Extra headers merged into every request
    pub request_headers: HeaderMap,

    /// Total per-request timeout
    pub request_timeout: Duration,

    /// Response size cap in bytes; zero or negative means unlimited
    pub max_content_length: Setting<i64>,

    /// Whether robots.txt is consulted at all
    pub robots_enabled: bool,

    /// How long fetched robots.txt bodies stay cached
    pub robots_cache_time: Duration,

    /// When false, a server error on `/robots.txt` blocks the origin
    pub robots_ignore_server_error: bool,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            interval: IntervalSetting::Fixed(DEFAULT_INTERVAL),
            concurrent_requests_limit: DEFAULT_CONCURRENT_REQUESTS_LIMIT,
            user_agent: Setting::Fixed(format!(
                "Mozilla/5.0 (compatible; orbweaver/{})",
                env!("CARGO_PKG_VERSION")
            )),
            request_headers: HeaderMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_content_length: Setting::Fixed(0),
            robots_enabled: true,
            robots_cache_time: crate::robots::DEFAULT_CACHE_TIME,
            robots_ignore_server_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_setting_resolves_same_value() {
        let setting: Setting<i64> = Setting::Fixed(42);
        assert_eq!(setting.resolve("http://a/"), 42);
        assert_eq!(setting.resolve("http://b/"), 42);
    }

    #[test]
    fn test_per_url_setting_sees_the_url() {
        let setting = Setting::per_url(|url: &str| url.len() as i64);
        assert_eq!(setting.resolve("http://a/"), 9);
        assert_eq!(setting.resolve("http://ab/"), 10);
    }

    #[test]
    fn test_dynamic_interval_is_consulted_each_time() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let interval = IntervalSetting::dynamic(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Duration::from_millis(5)
        });

        interval.current();
        interval.current();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_defaults() {
        let options = CrawlerOptions::default();
        assert_eq!(options.concurrent_requests_limit, 5);
        assert!(options.robots_enabled);
        assert!(!options.robots_ignore_server_error);
        assert_eq!(options.interval.current(), Duration::from_millis(1000));
        assert_eq!(options.max_content_length.resolve("http://a/"), 0);
    }
}
