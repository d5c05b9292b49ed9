//! HTML link extraction handler

use crate::handlers::{CrawlContext, Handler, HandlerError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts followable links from HTML responses
///
/// Collects `href` attributes from `a`, `link` and `area` elements,
/// resolves them against the page URL, keeps only `http`/`https` results
/// with fragments stripped, and deduplicates preserving document order.
/// Register it for `text/html`.
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for HtmlLinkExtractor {
    async fn handle(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError> {
        let base_url = match Url::parse(&ctx.url) {
            Ok(url) => url,
            // An unparseable page URL leaves nothing to resolve against.
            Err(_) => return Ok(Vec::new()),
        };

        let body = ctx.body_str();
        let document = Html::parse_document(&body);

        let mut links = Vec::new();
        let mut seen = HashSet::new();

        for selector_str in ["a[href]", "link[href]", "area[href]"] {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    if let Some(href) = element.value().attr("href") {
                        if let Some(absolute) = resolve_link(href, &base_url) {
                            if seen.insert(absolute.clone()) {
                                links.push(absolute);
                            }
                        }
                    }
                }
            }
        }

        Ok(links)
    }
}

/// Resolves an href to an absolute URL, or rejects it
///
/// Returns `None` for empty hrefs, same-page anchors, non-navigational
/// schemes (`javascript:`, `mailto:`, `tel:`, `data:`), and anything that
/// does not resolve to http(s). Fragments are stripped from the result.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(mut absolute) => {
            if absolute.scheme() == "http" || absolute.scheme() == "https" {
                absolute.set_fragment(None);
                Some(absolute.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_ctx(url: &str, body: &str) -> CrawlContext {
        CrawlContext {
            url: url.to_string(),
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_extracts_and_resolves_anchors() {
        let ctx = html_ctx(
            "http://example.com/dir/page",
            r#"<html><body>
                <a href="/absolute">one</a>
                <a href="relative">two</a>
                <a href="http://other.com/x">three</a>
            </body></html>"#,
        );

        let links = HtmlLinkExtractor::new().handle(&ctx).await.unwrap();
        assert_eq!(
            links,
            vec![
                "http://example.com/absolute",
                "http://example.com/dir/relative",
                "http://other.com/x",
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_non_navigational_schemes() {
        let ctx = html_ctx(
            "http://example.com/",
            r##"<a href="javascript:void(0)">a</a>
               <a href="mailto:x@example.com">b</a>
               <a href="tel:+123">c</a>
               <a href="#section">d</a>
               <a href="ftp://example.com/file">e</a>"##,
        );

        let links = HtmlLinkExtractor::new().handle(&ctx).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_strips_fragments_and_dedupes() {
        let ctx = html_ctx(
            "http://example.com/",
            r#"<a href="/page#top">a</a><a href="/page#bottom">b</a><a href="/page">c</a>"#,
        );

        let links = HtmlLinkExtractor::new().handle(&ctx).await.unwrap();
        assert_eq!(links, vec!["http://example.com/page"]);
    }

    #[tokio::test]
    async fn test_collects_link_and_area_elements() {
        let ctx = html_ctx(
            "http://example.com/",
            r#"<link rel="alternate" href="/feed"/>
               <map><area href="/map-target"/></map>"#,
        );

        let links = HtmlLinkExtractor::new().handle(&ctx).await.unwrap();
        assert!(links.contains(&"http://example.com/feed".to_string()));
        assert!(links.contains(&"http://example.com/map-target".to_string()));
    }

    #[tokio::test]
    async fn test_empty_body_yields_no_links() {
        let ctx = html_ctx("http://example.com/", "");
        let links = HtmlLinkExtractor::new().handle(&ctx).await.unwrap();
        assert!(links.is_empty());
    }
}
