use serde::Deserialize;

/// Main configuration structure for the orbweaver binary
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerSection,

    #[serde(default)]
    pub queue: QueueSection,

    /// Seed URLs the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSection {
    /// Minimum time between request starts (milliseconds)
    #[serde(rename = "interval-ms", default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum number of in-flight requests
    #[serde(
        rename = "concurrent-requests-limit",
        default = "default_concurrent_requests_limit"
    )]
    pub concurrent_requests_limit: usize,

    /// User agent sent with every request and tested against robots.txt
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Response size cap in bytes; zero or negative means unlimited
    #[serde(rename = "max-content-length", default)]
    pub max_content_length: i64,

    /// Whether robots.txt is consulted
    #[serde(rename = "robots-enabled", default = "default_true")]
    pub robots_enabled: bool,

    /// How long fetched robots.txt bodies stay cached (seconds)
    #[serde(rename = "robots-cache-time-secs", default = "default_robots_cache_secs")]
    pub robots_cache_time_secs: u64,

    /// When false, a server error on /robots.txt blocks the origin
    #[serde(rename = "robots-ignore-server-error", default)]
    pub robots_ignore_server_error: bool,
}

/// Queue backend configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSection {
    /// Path to the SQLite queue; omit for the in-memory queue
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Queue table name (defaults to "url")
    #[serde(rename = "table-name")]
    pub table_name: Option<String>,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_concurrent_requests_limit() -> usize {
    5
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; orbweaver/{})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_true() -> bool {
    true
}

fn default_robots_cache_secs() -> u64 {
    60 * 60
}
