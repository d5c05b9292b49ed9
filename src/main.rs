//! Orbweaver main entry point
//!
//! Wires a TOML configuration to the crawl engine with the bundled
//! handlers registered, then follows the event stream until the queue
//! drains.

use clap::Parser;
use orbweaver::config::load_config;
use orbweaver::handlers::{HtmlLinkExtractor, RobotsSitemapExtractor, XmlSitemapExtractor};
use orbweaver::{CrawlEvent, Crawler, DbUrlList, TypeMatcher, UrlList, UrlRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Orbweaver: a polite, extensible web crawler
#[derive(Parser, Debug)]
#[command(name = "orbweaver")]
#[command(version)]
#[command(about = "A polite, extensible web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let url_list: Arc<dyn UrlList> = match &config.queue.database_path {
        Some(path) => {
            let table = config.queue.table_name.as_deref().unwrap_or("url");
            tracing::info!("Using SQLite queue at {} (table '{}')", path, table);
            Arc::new(DbUrlList::open_with_table(Path::new(path), table)?)
        }
        None => {
            tracing::info!("Using in-memory queue");
            Arc::new(orbweaver::FifoUrlList::new())
        }
    };

    let crawler = Arc::new(Crawler::with_url_list(config.crawler_options(), url_list)?);
    crawler.add_handler(TypeMatcher::single("text/html"), Arc::new(HtmlLinkExtractor::new()));
    crawler.add_handler(
        TypeMatcher::single("text/plain"),
        Arc::new(RobotsSitemapExtractor::new()),
    );
    crawler.add_handler(
        TypeMatcher::list(["application/xml", "text/xml"]),
        Arc::new(XmlSitemapExtractor::new()),
    );

    let seeds: Vec<UrlRecord> = config.seeds.iter().map(|s| UrlRecord::new(s.clone())).collect();
    tracing::info!("Seeding {} URLs", seeds.len());
    crawler.url_list().insert_if_not_exists_bulk(seeds).await?;

    let mut events = crawler.subscribe();
    crawler.start();

    // Follow the crawl until the queue drains, then stop.
    while let Ok(event) = events.recv().await {
        match event {
            CrawlEvent::CrawledUrl {
                url,
                status_code,
                error_code,
                error_message,
            } => match error_code {
                None => tracing::info!(
                    "crawled {} (status {})",
                    url,
                    status_code.map_or_else(|| "-".to_string(), |s| s.to_string())
                ),
                Some(kind) => tracing::warn!(
                    "failed {} [{}]: {}",
                    url,
                    kind,
                    error_message.unwrap_or_default()
                ),
            },
            CrawlEvent::Redirect { url, location } => {
                tracing::debug!("redirect {} -> {}", url, location);
            }
            CrawlEvent::Links { url, links } => {
                if !links.is_empty() {
                    tracing::debug!("{} yielded {} links", url, links.len());
                }
            }
            CrawlEvent::UrlListComplete => {
                tracing::info!("URL list complete, stopping");
                crawler.stop();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("orbweaver=info,warn"),
            1 => EnvFilter::new("orbweaver=debug,info"),
            2 => EnvFilter::new("orbweaver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
