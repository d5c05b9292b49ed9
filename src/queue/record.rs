//! URL records and the crawl outcome taxonomy
//!
//! A [`UrlRecord`] is the immutable value the queue hands to the engine and
//! the engine hands back: the URL plus the outcome of its last attempt.

use std::fmt;

/// Classification of a failed crawl attempt
///
/// The database form of each tag is stable; it is what `error_code` stores
/// and what resumed crawls read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Robots policy disallows the URL, or the robots fetch hit a server
    /// error while server errors are treated as blocking
    RobotsNotAllowed,

    /// The response arrived with a status >= 400
    HttpError,

    /// Transport-level failure: DNS, connect, TLS, read, oversized body
    RequestError,

    /// A matched content handler failed while processing the response
    HandlersError,

    /// Any failure not classified above
    OtherError,
}

impl ErrorKind {
    /// Converts the kind to its stable database string
    pub fn to_db_string(self) -> &'static str {
        match self {
            ErrorKind::RobotsNotAllowed => "ROBOTS_NOT_ALLOWED",
            ErrorKind::HttpError => "HTTP_ERROR",
            ErrorKind::RequestError => "REQUEST_ERROR",
            ErrorKind::HandlersError => "HANDLERS_ERROR",
            ErrorKind::OtherError => "OTHER_ERROR",
        }
    }

    /// Parses the stable database string back into a kind
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ROBOTS_NOT_ALLOWED" => Some(ErrorKind::RobotsNotAllowed),
            "HTTP_ERROR" => Some(ErrorKind::HttpError),
            "REQUEST_ERROR" => Some(ErrorKind::RequestError),
            "HANDLERS_ERROR" => Some(ErrorKind::HandlersError),
            "OTHER_ERROR" => Some(ErrorKind::OtherError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Stored state for one URL: its identity and its last outcome
///
/// Identity is the URL string. A record with `error_code == None` describes
/// either a URL that has not been attempted yet or a successful attempt;
/// `num_errors` counts cumulative failures across attempts and is maintained
/// by the queue backend on upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Absolute URL string
    pub url: String,

    /// HTTP status of the last fetch, if a response arrived
    pub status_code: Option<u16>,

    /// Failure classification; `None` means the last attempt succeeded
    pub error_code: Option<ErrorKind>,

    /// Free-text failure message accompanying `error_code`
    pub error_message: Option<String>,

    /// Cumulative failure count across attempts
    pub num_errors: u32,
}

impl UrlRecord {
    /// Creates a fresh, unattempted record for a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: None,
            error_code: None,
            error_message: None,
            num_errors: 0,
        }
    }

    /// Creates a successful outcome carrying the response status
    pub fn success(url: impl Into<String>, status_code: u16) -> Self {
        Self {
            url: url.into(),
            status_code: Some(status_code),
            error_code: None,
            error_message: None,
            num_errors: 0,
        }
    }

    /// Creates a failure outcome
    ///
    /// `status_code` is present only for `HTTP_ERROR` outcomes, where the
    /// response status is recorded alongside the tag. `num_errors` is left
    /// at zero; the queue backend computes the cumulative count on upsert.
    pub fn failure(
        url: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            url: url.into(),
            status_code,
            error_code: Some(kind),
            error_message: Some(message.into()),
            num_errors: 0,
        }
    }

    /// Whether the last attempt failed
    pub fn is_failure(&self) -> bool {
        self.error_code.is_some()
    }
}
