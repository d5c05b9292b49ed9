//! The crawl engine
//!
//! `start()` spawns `concurrent_requests_limit` tick chains. Each chain
//! repeatedly: waits its turn under the shared pacing clock, dequeues a
//! URL, runs it through the processing pipeline (robots check, fetch,
//! redirect-or-dispatch), and stores the outcome. Classified failures
//! become outcome records; queue failures are fatal for the chain that
//! hit them.

use crate::crawler::events::CrawlEvent;
use crate::crawler::fetcher::{self, FetchedPage};
use crate::crawler::options::CrawlerOptions;
use crate::handlers::{dispatch_all, CrawlContext, Handler, HandlerRegistry, TypeMatcher};
use crate::queue::{ErrorKind, FifoUrlList, QueueError, UrlList, UrlRecord};
use crate::robots::{robots_url_for, RobotsCache, RobotsPolicy};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use url::Url;

/// Broadcast buffer for crawl events; slow subscribers miss old events
/// rather than stalling the engine
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Classified failure of one crawl attempt, carried through the pipeline
/// until the outcome record is built
#[derive(Debug)]
enum CrawlFailure {
    RobotsNotAllowed(String),
    Http(u16),
    Request(String),
    Handlers(String),
    Other(String),
}

impl CrawlFailure {
    fn into_outcome(self, url: &str) -> UrlRecord {
        match self {
            CrawlFailure::RobotsNotAllowed(message) => {
                UrlRecord::failure(url, ErrorKind::RobotsNotAllowed, message, None)
            }
            CrawlFailure::Http(status) => UrlRecord::failure(
                url,
                ErrorKind::HttpError,
                format!("HTTP status {}", status),
                Some(status),
            ),
            CrawlFailure::Request(message) => {
                UrlRecord::failure(url, ErrorKind::RequestError, message, None)
            }
            CrawlFailure::Handlers(message) => {
                UrlRecord::failure(url, ErrorKind::HandlersError, message, None)
            }
            CrawlFailure::Other(message) => {
                UrlRecord::failure(url, ErrorKind::OtherError, message, None)
            }
        }
    }
}

/// Why the pipeline stopped early: a classified failure that becomes an
/// outcome, or a queue failure that propagates to the tick loop
enum ProcessAbort {
    Failure(CrawlFailure),
    Queue(QueueError),
}

impl From<QueueError> for ProcessAbort {
    fn from(error: QueueError) -> Self {
        ProcessAbort::Queue(error)
    }
}

struct CrawlSuccess {
    status_code: u16,
    links: Vec<String>,
}

/// The polite crawler
///
/// Construction wires the queue, robots cache and HTTP clients together;
/// [`start`](Crawler::start) spawns the tick chains and returns
/// immediately. Progress is observable through
/// [`subscribe`](Crawler::subscribe).
///
/// # Example
///
/// ```no_run
/// use orbweaver::{Crawler, CrawlerOptions, UrlRecord};
/// use std::sync::Arc;
///
/// # async fn example() -> orbweaver::Result<()> {
/// let crawler = Arc::new(Crawler::new(CrawlerOptions::default())?);
/// crawler
///     .url_list()
///     .insert_if_not_exists(UrlRecord::new("https://example.com/"))
///     .await?;
/// crawler.start();
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    options: CrawlerOptions,
    url_list: Arc<dyn UrlList>,
    handlers: RwLock<HandlerRegistry>,
    robots_cache: RobotsCache,
    fetch_client: Client,
    robots_client: Client,
    events: broadcast::Sender<CrawlEvent>,
    started: AtomicBool,
    outstanding: AtomicUsize,
    /// Pacing clock shared by all chains; written synchronously before the
    /// owning chain yields, which is what keeps request starts at least one
    /// interval apart under contention
    last_request_start: Mutex<Option<Instant>>,
}

impl Crawler {
    /// Creates a crawler over an in-memory FIFO queue
    pub fn new(options: CrawlerOptions) -> crate::Result<Self> {
        Self::with_url_list(options, Arc::new(FifoUrlList::new()))
    }

    /// Creates a crawler over the given queue backend
    pub fn with_url_list(
        options: CrawlerOptions,
        url_list: Arc<dyn UrlList>,
    ) -> crate::Result<Self> {
        let fetch_client = fetcher::build_client(&options, false)?;
        let robots_client = fetcher::build_client(&options, true)?;
        let robots_cache = RobotsCache::with_ttl(options.robots_cache_time);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            options,
            url_list,
            handlers: RwLock::new(HandlerRegistry::new()),
            robots_cache,
            fetch_client,
            robots_client,
            events,
            started: AtomicBool::new(false),
            outstanding: AtomicUsize::new(0),
            last_request_start: Mutex::new(None),
        })
    }

    /// The queue backend, for seeding and inspection
    pub fn url_list(&self) -> Arc<dyn UrlList> {
        Arc::clone(&self.url_list)
    }

    /// Registers a content handler
    ///
    /// Allowed after `start()` too; the handler takes effect on subsequent
    /// dispatches.
    pub fn add_handler(&self, matcher: impl Into<TypeMatcher>, handler: Arc<dyn Handler>) {
        self.handlers.write().unwrap().register(matcher.into(), handler);
    }

    /// Subscribes to crawl events
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.events.subscribe()
    }

    /// Whether the engine is currently running
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of chains currently dequeuing or processing a URL
    pub fn outstanding_requests(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Starts the tick chains
    ///
    /// Returns `false` if the engine was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::info!(
            "starting crawl with {} tick chains",
            self.options.concurrent_requests_limit
        );
        for chain in 0..self.options.concurrent_requests_limit {
            let crawler = Arc::clone(self);
            tokio::spawn(async move { crawler.run_chain(chain).await });
        }
        true
    }

    /// Stops dequeuing
    ///
    /// Advisory: in-flight requests run to completion and their outcomes
    /// are still recorded; no new URLs are dequeued.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn emit(&self, event: CrawlEvent) {
        // No receivers is fine; events are observability, not control flow.
        let _ = self.events.send(event);
    }

    /// Claims the next request slot under the pacing clock
    ///
    /// Returns `None` when this chain may start a request now (the clock
    /// has been advanced on its behalf), or the time to sleep before
    /// trying again. The write happens under the lock and before any
    /// await, so concurrent chains cannot observe a stale clock and fire
    /// together.
    fn claim_request_slot(&self) -> Option<Duration> {
        let interval = self.options.interval.current();
        let mut last = self.last_request_start.lock().unwrap();
        let now = Instant::now();
        match *last {
            Some(previous) => {
                let next_allowed = previous + interval;
                if next_allowed > now {
                    Some(next_allowed - now)
                } else {
                    *last = Some(now);
                    None
                }
            }
            None => {
                *last = Some(now);
                None
            }
        }
    }

    async fn run_chain(self: Arc<Self>, chain: usize) {
        tracing::debug!("tick chain {} running", chain);
        loop {
            if !self.started.load(Ordering::SeqCst) {
                break;
            }

            if let Some(wait) = self.claim_request_slot() {
                tokio::time::sleep(wait).await;
                continue;
            }

            // Counted from before the dequeue so a chain that is about to
            // receive the last entry is never invisible to a chain that
            // finds the queue empty at the same moment.
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            match self.url_list.get_next_url().await {
                Ok(record) => {
                    let processed = self.process_url(&record.url).await;
                    let stored = match processed {
                        Ok(outcome) => self.url_list.upsert(outcome).await,
                        Err(error) => Err(error),
                    };
                    self.outstanding.fetch_sub(1, Ordering::SeqCst);

                    if let Err(error) = stored {
                        tracing::error!(
                            "queue failure for {}: {}; tick chain {} giving up",
                            record.url,
                            error,
                            chain
                        );
                        break;
                    }
                }
                Err(QueueError::Empty) => {
                    let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
                    self.emit(CrawlEvent::UrlListEmpty);
                    if remaining == 0 {
                        self.emit(CrawlEvent::UrlListComplete);
                    }
                    tokio::time::sleep(self.options.interval.current()).await;
                }
                Err(error) => {
                    self.outstanding.fetch_sub(1, Ordering::SeqCst);
                    tracing::error!(
                        "dequeue failed: {}; tick chain {} giving up",
                        error,
                        chain
                    );
                    break;
                }
            }
        }
        tracing::debug!("tick chain {} stopped", chain);
    }

    /// Runs one URL through the pipeline and builds its outcome record
    ///
    /// Classified failures are converted into the outcome; only queue
    /// failures surface as errors.
    async fn process_url(&self, url: &str) -> Result<UrlRecord, QueueError> {
        self.emit(CrawlEvent::CrawlUrl {
            url: url.to_string(),
        });
        tracing::debug!("crawling {}", url);

        let outcome = match self.crawl_once(url).await {
            Ok(success) => {
                self.emit(CrawlEvent::Links {
                    url: url.to_string(),
                    links: success.links.clone(),
                });
                if !success.links.is_empty() {
                    let records = success
                        .links
                        .iter()
                        .map(|link| UrlRecord::new(link.clone()))
                        .collect();
                    self.url_list.insert_if_not_exists_bulk(records).await?;
                }
                UrlRecord::success(url, success.status_code)
            }
            Err(ProcessAbort::Queue(error)) => return Err(error),
            Err(ProcessAbort::Failure(failure)) => {
                tracing::debug!("crawl of {} failed: {:?}", url, failure);
                failure.into_outcome(url)
            }
        };

        self.emit(CrawlEvent::CrawledUrl {
            url: url.to_string(),
            status_code: outcome.status_code,
            error_code: outcome.error_code,
            error_message: outcome.error_message.clone(),
        });
        Ok(outcome)
    }

    async fn crawl_once(&self, url: &str) -> Result<CrawlSuccess, ProcessAbort> {
        let parsed = Url::parse(url).map_err(|error| {
            ProcessAbort::Failure(CrawlFailure::Other(format!("invalid URL: {}", error)))
        })?;
        let user_agent = self.options.user_agent.resolve(url);

        if self.options.robots_enabled {
            self.check_robots(&parsed, &user_agent).await?;
        }

        let max_content_length = self.options.max_content_length.resolve(url);
        let page = fetcher::fetch_page(&self.fetch_client, &parsed, &user_agent, max_content_length)
            .await
            .map_err(|error| {
                ProcessAbort::Failure(CrawlFailure::Request(error.to_string()))
            })?;

        let status_code = page.status;
        if status_code >= 400 {
            self.emit(CrawlEvent::HttpError {
                url: url.to_string(),
                status_code,
            });
            return Err(ProcessAbort::Failure(CrawlFailure::Http(status_code)));
        }

        let links = if fetcher::is_redirect(status_code) {
            self.redirect_links(url, &parsed, &page)
        } else {
            self.dispatch_links(url, &parsed, page).await?
        };

        Ok(CrawlSuccess { status_code, links })
    }

    /// A redirect's destination is its sole discovered link
    fn redirect_links(&self, url: &str, parsed: &Url, page: &FetchedPage) -> Vec<String> {
        match &page.location {
            Some(location) => {
                self.emit(CrawlEvent::Redirect {
                    url: url.to_string(),
                    location: location.clone(),
                });
                match parsed.join(location) {
                    Ok(destination) => vec![destination.to_string()],
                    Err(error) => {
                        tracing::debug!("unresolvable redirect from {}: {}", url, error);
                        Vec::new()
                    }
                }
            }
            // Nothing to follow.
            None => Vec::new(),
        }
    }

    async fn dispatch_links(
        &self,
        url: &str,
        parsed: &Url,
        page: FetchedPage,
    ) -> Result<Vec<String>, ProcessAbort> {
        let content_type = fetcher::determine_content_type(page.content_type.as_deref(), parsed);
        let ctx = CrawlContext {
            url: url.to_string(),
            content_type,
            body: page.body,
        };

        // Snapshot under the lock, dispatch outside it, so handlers added
        // mid-crawl only affect later dispatches.
        let matched = self.handlers.read().unwrap().matching(&ctx.content_type);
        match dispatch_all(matched, &ctx).await {
            Ok(links) => Ok(links),
            Err(error) => {
                let message = error.to_string();
                self.emit(CrawlEvent::HandlersError {
                    url: url.to_string(),
                    message: message.clone(),
                });
                Err(ProcessAbort::Failure(CrawlFailure::Handlers(message)))
            }
        }
    }

    /// Applies the robots gate to a target URL
    ///
    /// On a cache miss the robots URL is enqueued (so content handlers see
    /// its body as a normal crawl) and fetched with redirects enabled. A
    /// server error blocks the origin unless `robots_ignore_server_error`
    /// is set; every other retrieval problem is treated as permissive.
    async fn check_robots(&self, target: &Url, user_agent: &str) -> Result<(), ProcessAbort> {
        let robots_url = match robots_url_for(target) {
            Some(robots_url) => robots_url,
            None => return Ok(()),
        };

        let body = match self.robots_cache.get(robots_url.as_str()) {
            Some(body) => body,
            None => {
                self.url_list
                    .insert_if_not_exists(UrlRecord::new(robots_url.as_str()))
                    .await?;
                let body = self.fetch_robots_body(&robots_url, user_agent).await?;
                self.robots_cache.set(robots_url.as_str(), body.clone());
                body
            }
        };

        let policy = RobotsPolicy::new(body);
        if policy.is_allowed(target.as_str(), user_agent) {
            Ok(())
        } else {
            Err(ProcessAbort::Failure(CrawlFailure::RobotsNotAllowed(
                format!("disallowed by robots.txt: {}", target),
            )))
        }
    }

    async fn fetch_robots_body(
        &self,
        robots_url: &Url,
        user_agent: &str,
    ) -> Result<String, ProcessAbort> {
        let response = self
            .robots_client
            .get(robots_url.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_server_error() => {
                if self.options.robots_ignore_server_error {
                    Ok(String::new())
                } else {
                    Err(ProcessAbort::Failure(CrawlFailure::RobotsNotAllowed(
                        format!(
                            "robots.txt fetch returned HTTP {}",
                            response.status().as_u16()
                        ),
                    )))
                }
            }
            Ok(response) if response.status().is_success() => {
                Ok(response.text().await.unwrap_or_default())
            }
            // 4xx and friends: no usable policy, crawl permissively.
            Ok(_) => Ok(String::new()),
            Err(error) => {
                tracing::debug!("robots fetch failed for {}: {}", robots_url, error);
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::options::IntervalSetting;

    fn test_crawler(interval: Duration) -> Arc<Crawler> {
        let options = CrawlerOptions {
            interval: IntervalSetting::Fixed(interval),
            ..CrawlerOptions::default()
        };
        Arc::new(Crawler::new(options).unwrap())
    }

    #[tokio::test]
    async fn test_first_slot_is_immediate() {
        let crawler = test_crawler(Duration::from_millis(500));
        assert!(crawler.claim_request_slot().is_none());
    }

    #[tokio::test]
    async fn test_second_slot_waits_out_the_interval() {
        let crawler = test_crawler(Duration::from_millis(500));
        assert!(crawler.claim_request_slot().is_none());

        let wait = crawler.claim_request_slot().expect("second claim must wait");
        assert!(wait <= Duration::from_millis(500));
        assert!(wait > Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_slot_reopens_after_interval() {
        let crawler = test_crawler(Duration::from_millis(20));
        assert!(crawler.claim_request_slot().is_none());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(crawler.claim_request_slot().is_none());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let crawler = test_crawler(Duration::from_millis(10));
        assert!(crawler.start());
        assert!(!crawler.start());
        crawler.stop();
        assert!(!crawler.is_started());
    }

    #[test]
    fn test_failure_outcome_mapping() {
        let outcome = CrawlFailure::Http(503).into_outcome("http://example.com/");
        assert_eq!(outcome.error_code, Some(ErrorKind::HttpError));
        assert_eq!(outcome.status_code, Some(503));

        let outcome =
            CrawlFailure::Request("connection failed".to_string()).into_outcome("http://a/");
        assert_eq!(outcome.error_code, Some(ErrorKind::RequestError));
        assert_eq!(outcome.status_code, None);

        let outcome = CrawlFailure::Other("invalid URL".to_string()).into_outcome("nonsense");
        assert_eq!(outcome.error_code, Some(ErrorKind::OtherError));
    }
}
