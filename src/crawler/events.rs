//! Typed crawl events
//!
//! The engine reports progress over a broadcast channel; subscribe with
//! [`Crawler::subscribe`](crate::crawler::Crawler::subscribe). Events from
//! different in-flight URLs interleave freely, but within one URL the order
//! is: `CrawlUrl`, then any of `Redirect` / `HttpError` / `HandlersError`,
//! then `Links`, then `CrawledUrl`.

use crate::queue::ErrorKind;

/// One observable step of the crawl
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A URL is about to be processed
    CrawlUrl { url: String },

    /// A URL finished processing with this outcome
    CrawledUrl {
        url: String,
        status_code: Option<u16>,
        error_code: Option<ErrorKind>,
        error_message: Option<String>,
    },

    /// The response was a redirect; `location` is the raw header value
    Redirect { url: String, location: String },

    /// The links discovered for a URL, before they are enqueued
    Links { url: String, links: Vec<String> },

    /// The response arrived with a status >= 400
    HttpError { url: String, status_code: u16 },

    /// A matched handler failed while processing the response
    HandlersError { url: String, message: String },

    /// A dequeue found the queue empty
    UrlListEmpty,

    /// The queue is empty and no request is in flight
    UrlListComplete,
}
