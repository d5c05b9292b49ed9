//! Content handlers and dispatch
//!
//! A handler consumes a fetched response and returns discovered URLs. The
//! registry pairs each handler with a content-type matcher and dispatches
//! responses to every matching handler in registration order, concatenating
//! what they return.

mod html;
mod sitemap;

pub use html::HtmlLinkExtractor;
pub use sitemap::{RobotsSitemapExtractor, XmlSitemapExtractor};

use async_trait::async_trait;
use std::sync::Arc;

/// What a handler sees for one response
#[derive(Debug, Clone)]
pub struct CrawlContext {
    /// The URL that was fetched
    pub url: String,

    /// Content type with parameters stripped (no `; charset=...` suffix)
    pub content_type: String,

    /// Raw response body
    pub body: Vec<u8>,
}

impl CrawlContext {
    /// The body decoded as UTF-8, lossily
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Error type handlers may fail with
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A content handler
///
/// Handlers are invoked concurrently across in-flight URLs and must be
/// safe for that; within one dispatch they run sequentially in
/// registration order.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Processes a response, returning discovered URLs (possibly none)
    async fn handle(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError>;
}

/// Adapter that lets a plain closure act as a handler
///
/// Keeps one-off link extractors and test doubles cheap to write:
///
/// ```
/// use orbweaver::handlers::{FnHandler, CrawlContext};
///
/// let handler = FnHandler::new(|ctx: &CrawlContext| {
///     Ok(vec![format!("{}?page=2", ctx.url)])
/// });
/// # let _ = handler;
/// ```
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&CrawlContext) -> Result<Vec<String>, HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&CrawlContext) -> Result<Vec<String>, HandlerError> + Send + Sync,
{
    async fn handle(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError> {
        (self.0)(ctx)
    }
}

/// Content-type matcher attached to a registered handler
#[derive(Debug, Clone)]
pub enum TypeMatcher {
    /// Matches every content type
    Wildcard,

    /// Matches the exact type, or any type under it as a prefix:
    /// `Single("text")` matches `text` and `text/html`
    Single(String),

    /// Matches by exact membership
    List(Vec<String>),
}

impl TypeMatcher {
    /// Convenience constructor for a single-type matcher
    pub fn single(content_type: impl Into<String>) -> Self {
        TypeMatcher::Single(content_type.into())
    }

    /// Convenience constructor for a list matcher
    pub fn list<I, S>(content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeMatcher::List(content_types.into_iter().map(Into::into).collect())
    }

    /// Tests an incoming content type (already stripped of parameters)
    pub fn matches(&self, content_type: &str) -> bool {
        match self {
            TypeMatcher::Wildcard => true,
            TypeMatcher::Single(t) => {
                content_type == t
                    || (content_type.len() > t.len()
                        && content_type.starts_with(t.as_str())
                        && content_type.as_bytes()[t.len()] == b'/')
            }
            TypeMatcher::List(types) => types.iter().any(|t| t == content_type),
        }
    }
}

impl From<&str> for TypeMatcher {
    /// `"*"` becomes the wildcard; anything else a single-type matcher
    fn from(s: &str) -> Self {
        if s == "*" {
            TypeMatcher::Wildcard
        } else {
            TypeMatcher::Single(s.to_string())
        }
    }
}

struct HandlerEntry {
    matcher: TypeMatcher,
    handler: Arc<dyn Handler>,
}

/// Ordered list of `(matcher, handler)` pairs
///
/// Dispatch walks the pairs in registration order; every matching handler
/// runs and its links are concatenated onto the result. The first handler
/// failure aborts the walk and surfaces to the caller; later handlers do
/// not run.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<HandlerEntry>,
}

impl HandlerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a handler with its matcher
    pub fn register(&mut self, matcher: TypeMatcher, handler: Arc<dyn Handler>) {
        self.entries.push(HandlerEntry { matcher, handler });
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no handlers
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A snapshot of the handlers matching `content_type`, in order
    ///
    /// The engine takes a snapshot before dispatching so handlers appended
    /// mid-crawl only affect subsequent dispatches.
    pub fn matching(&self, content_type: &str) -> Vec<Arc<dyn Handler>> {
        self.entries
            .iter()
            .filter(|entry| entry.matcher.matches(content_type))
            .map(|entry| Arc::clone(&entry.handler))
            .collect()
    }

    /// Dispatches a context to every matching handler
    pub async fn dispatch(&self, ctx: &CrawlContext) -> Result<Vec<String>, HandlerError> {
        dispatch_all(self.matching(&ctx.content_type), ctx).await
    }
}

/// Runs a snapshot of handlers over a context, concatenating links
pub(crate) async fn dispatch_all(
    handlers: Vec<Arc<dyn Handler>>,
    ctx: &CrawlContext,
) -> Result<Vec<String>, HandlerError> {
    let mut links = Vec::new();
    for handler in handlers {
        links.extend(handler.handle(ctx).await?);
    }
    Ok(links)
}

/// Strips content-type parameters: everything from the first `;` onward
///
/// The result is trimmed and lowercased so header case or charset
/// parameters cannot defeat an exact matcher.
pub fn strip_type_parameters(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(content_type: &str) -> CrawlContext {
        CrawlContext {
            url: "http://example.com/".to_string(),
            content_type: content_type.to_string(),
            body: Vec::new(),
        }
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let matcher = TypeMatcher::Wildcard;
        assert!(matcher.matches("text/html"));
        assert!(matcher.matches("application/json"));
        assert!(matcher.matches(""));
    }

    #[test]
    fn test_single_matches_exact_and_prefix() {
        let matcher = TypeMatcher::single("text");
        assert!(matcher.matches("text"));
        assert!(matcher.matches("text/html"));
        assert!(matcher.matches("text/plain"));
        assert!(!matcher.matches("texting"));
        assert!(!matcher.matches("application/text"));
    }

    #[test]
    fn test_single_full_type_is_exact() {
        let matcher = TypeMatcher::single("text/html");
        assert!(matcher.matches("text/html"));
        assert!(!matcher.matches("text/html2"));
        assert!(!matcher.matches("text"));
    }

    #[test]
    fn test_list_matches_by_membership() {
        let matcher = TypeMatcher::list(["application/xml", "text/xml"]);
        assert!(matcher.matches("text/xml"));
        assert!(matcher.matches("application/xml"));
        assert!(!matcher.matches("text"));
        assert!(!matcher.matches("text/xml2"));
    }

    #[test]
    fn test_from_str() {
        assert!(matches!(TypeMatcher::from("*"), TypeMatcher::Wildcard));
        assert!(matches!(TypeMatcher::from("text/html"), TypeMatcher::Single(_)));
    }

    #[test]
    fn test_strip_type_parameters() {
        assert_eq!(strip_type_parameters("text/html; charset=utf-8"), "text/html");
        assert_eq!(strip_type_parameters("Text/HTML"), "text/html");
        assert_eq!(strip_type_parameters("text/plain"), "text/plain");
        assert_eq!(strip_type_parameters(" text/plain ; boundary=x"), "text/plain");
        assert_eq!(strip_type_parameters(""), "");
    }

    #[tokio::test]
    async fn test_dispatch_concatenates_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            TypeMatcher::single("text/html"),
            Arc::new(FnHandler::new(|_ctx: &CrawlContext| -> Result<Vec<String>, HandlerError> {
                Ok(vec!["http://example.com/a".to_string()])
            })),
        );
        registry.register(
            TypeMatcher::Wildcard,
            Arc::new(FnHandler::new(|_ctx: &CrawlContext| -> Result<Vec<String>, HandlerError> {
                Ok(vec!["http://example.com/b".to_string()])
            })),
        );

        let links = registry.dispatch(&ctx("text/html")).await.unwrap();
        assert_eq!(links, vec!["http://example.com/a", "http://example.com/b"]);
    }

    #[tokio::test]
    async fn test_dispatch_skips_non_matching() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            TypeMatcher::single("application/json"),
            Arc::new(FnHandler::new(|_ctx: &CrawlContext| -> Result<Vec<String>, HandlerError> {
                Ok(vec!["http://example.com/json".to_string()])
            })),
        );

        let links = registry.dispatch(&ctx("text/html")).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_first_error_stops_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            TypeMatcher::Wildcard,
            Arc::new(FnHandler::new(|_ctx: &CrawlContext| -> Result<Vec<String>, HandlerError> {
                Err("boom".into())
            })),
        );
        registry.register(
            TypeMatcher::Wildcard,
            Arc::new(FnHandler::new(|_ctx: &CrawlContext| -> Result<Vec<String>, HandlerError> {
                Ok(vec!["http://example.com/later".to_string()])
            })),
        );

        let result = registry.dispatch(&ctx("text/html")).await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
