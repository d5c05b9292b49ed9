//! Orbweaver: a polite, extensible web crawler
//!
//! This crate implements a crawl engine that fetches pages at a controlled
//! rate, respects robots.txt, dispatches responses to content handlers,
//! feeds discovered URLs back into its queue, and records per-URL outcomes
//! durably so crawls can be resumed and shared across processes.

pub mod config;
pub mod crawler;
pub mod handlers;
pub mod queue;
pub mod robots;

use thiserror::Error;

/// Main error type for orbweaver operations
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for orbweaver operations
pub type Result<T> = std::result::Result<T, WeaverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crawler::{CrawlEvent, Crawler, CrawlerOptions, IntervalSetting, Setting};
pub use handlers::{CrawlContext, FnHandler, Handler, HandlerError, HandlerRegistry, TypeMatcher};
pub use queue::{DbUrlList, ErrorKind, FifoUrlList, QueueError, UrlList, UrlRecord};
pub use robots::{RobotsCache, RobotsPolicy};
