//! The crawl engine and its configuration
//!
//! This module contains the scheduling core:
//! - request pacing and concurrency across tick chains
//! - the robots gate and per-URL processing pipeline
//! - error classification into outcome records
//! - typed event emission

mod engine;
mod events;
mod fetcher;
mod options;

pub use engine::Crawler;
pub use events::CrawlEvent;
pub use options::{
    CrawlerOptions, IntervalSetting, Setting, DEFAULT_CONCURRENT_REQUESTS_LIMIT, DEFAULT_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT,
};
