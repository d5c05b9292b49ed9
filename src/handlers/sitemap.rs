//! Sitemap discovery handlers
//!
//! Two handlers cooperate to pull sitemaps into the crawl: one reads
//! `Sitemap:` lines out of robots.txt bodies (the engine enqueues every
//! robots URL it looks up, so these bodies flow through dispatch), the
//! other extracts `<loc>` entries from the sitemap documents themselves.

use crate::handlers::{CrawlContext, Handler, HandlerError};
use async_trait::async_trait;
use url::Url;

/// Extracts `Sitemap:` directives from robots.txt responses
///
/// Register it for `text/plain`; bodies whose URL path is not
/// `/robots.txt` are ignored.
pub struct RobotsSitemapExtractor;

impl RobotsSitemapExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RobotsSitemapExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for RobotsSitemapExtractor {
    async fn handle(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError> {
        match Url::parse(&ctx.url) {
            Ok(url) if url.path() == "/robots.txt" => {}
            _ => return Ok(Vec::new()),
        }

        let body = ctx.body_str();
        let mut sitemaps = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            if let Some((key, value)) = line.split_once(':') {
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    let value = value.trim();
                    if !value.is_empty() {
                        sitemaps.push(value.to_string());
                    }
                }
            }
        }
        Ok(sitemaps)
    }
}

/// Extracts `<loc>` URLs from XML sitemaps
///
/// Handles both `urlset` and `sitemapindex` documents by line scanning,
/// so a sitemap index feeds its child sitemaps back into the queue.
/// Register it for `application/xml` and `text/xml`.
pub struct XmlSitemapExtractor;

impl XmlSitemapExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmlSitemapExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for XmlSitemapExtractor {
    async fn handle(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError> {
        Ok(extract_locs(&ctx.body_str()))
    }
}

/// Pulls every `<loc>` value out of a sitemap document, unescaping the
/// XML entities that are legal inside a URL
fn extract_locs(xml: &str) -> Vec<String> {
    let mut locs = Vec::new();
    for line in xml.lines() {
        let mut rest = line;
        while let Some(start) = rest.find("<loc>") {
            let after = &rest[start + 5..];
            match after.find("</loc>") {
                Some(end) => {
                    let raw = after[..end].trim();
                    if !raw.is_empty() {
                        locs.push(unescape_entities(raw));
                    }
                    rest = &after[end + 6..];
                }
                None => break,
            }
        }
    }
    locs
}

fn unescape_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}
