//! Configuration for the orbweaver binary
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and converting them into engine options.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, CrawlerSection, QueueSection};

use crate::crawler::{CrawlerOptions, IntervalSetting, Setting};
use std::time::Duration;

impl Config {
    /// Converts the file configuration into engine options
    pub fn crawler_options(&self) -> CrawlerOptions {
        CrawlerOptions {
            interval: IntervalSetting::Fixed(Duration::from_millis(self.crawler.interval_ms)),
            concurrent_requests_limit: self.crawler.concurrent_requests_limit,
            user_agent: Setting::Fixed(self.crawler.user_agent.clone()),
            max_content_length: Setting::Fixed(self.crawler.max_content_length),
            robots_enabled: self.crawler.robots_enabled,
            robots_cache_time: Duration::from_secs(self.crawler.robots_cache_time_secs),
            robots_ignore_server_error: self.crawler.robots_ignore_server_error,
            ..CrawlerOptions::default()
        }
    }
}
