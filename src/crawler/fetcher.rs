//! HTTP fetching for the engine
//!
//! Two client configurations exist: target fetches never follow redirects
//! (the engine turns them into discovered links), while robots fetches
//! follow a bounded redirect chain. Both decode gzip/brotli and carry the
//! configured extra headers and timeout.

use crate::crawler::options::CrawlerOptions;
use reqwest::header::{CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Maximum redirect hops when fetching robots.txt
const ROBOTS_MAX_REDIRECTS: usize = 10;

/// Builds a client from the engine options
///
/// `follow_redirects` selects between the target policy (none) and the
/// robots policy (bounded).
pub(crate) fn build_client(
    options: &CrawlerOptions,
    follow_redirects: bool,
) -> Result<Client, reqwest::Error> {
    let policy = if follow_redirects {
        Policy::limited(ROBOTS_MAX_REDIRECTS)
    } else {
        Policy::none()
    };

    Client::builder()
        .redirect(policy)
        .default_headers(options.request_headers.clone())
        .timeout(options.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A response summary for the engine: status plus the headers it branches on
#[derive(Debug)]
pub(crate) struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

/// Transport-level fetch failure
#[derive(Debug)]
pub(crate) enum FetchError {
    /// DNS, connect, TLS, timeout or read failure
    Transport(String),

    /// The response body exceeded the configured cap
    BodyTooLarge { limit: i64 },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(message) => write!(f, "{}", message),
            FetchError::BodyTooLarge { limit } => {
                write!(f, "response body exceeded {} bytes", limit)
            }
        }
    }
}

fn classify_transport(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Fetches a target URL without following redirects
///
/// Applies the user agent and, when `max_content_length` is positive,
/// rejects oversized bodies both from the `Content-Length` header and from
/// the actual byte count. Any HTTP status is returned as a page; only
/// transport problems are errors.
pub(crate) async fn fetch_page(
    client: &Client,
    url: &Url,
    user_agent: &str,
    max_content_length: i64,
) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .header(USER_AGENT, user_agent)
        .send()
        .await
        .map_err(|e| FetchError::Transport(classify_transport(&e)))?;

    let status = response.status().as_u16();
    let content_type = header_str(&response, CONTENT_TYPE);
    let location = header_str(&response, LOCATION);

    if max_content_length > 0 {
        if let Some(announced) = response.content_length() {
            if announced as i64 > max_content_length {
                return Err(FetchError::BodyTooLarge {
                    limit: max_content_length,
                });
            }
        }
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(classify_transport(&e)))?;

    if max_content_length > 0 && body.len() as i64 > max_content_length {
        return Err(FetchError::BodyTooLarge {
            limit: max_content_length,
        });
    }

    Ok(FetchedPage {
        status,
        content_type,
        location,
        body: body.to_vec(),
    })
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Determines the stripped content type for handler dispatch
///
/// Prefers the `Content-Type` header; falls back to guessing from the URL
/// path extension, and finally to `application/octet-stream`.
pub(crate) fn determine_content_type(header: Option<&str>, url: &Url) -> String {
    match header {
        Some(value) if !value.trim().is_empty() => {
            crate::handlers::strip_type_parameters(value)
        }
        _ => mime_guess::from_path(url.path())
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_ascii_lowercase(),
    }
}

/// Whether a status is a redirect the engine should surface as a link
pub(crate) fn is_redirect(status: u16) -> bool {
    StatusCode::from_u16(status)
        .map(|s| s.is_redirection())
        .unwrap_or(false)
}
