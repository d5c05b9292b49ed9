//! Crawl queue abstraction and its backends
//!
//! This module defines the queue seam the engine crawls against:
//! - idempotent enqueue of discovered URLs (single and bulk)
//! - exclusive dequeue with at-most-once dispatch across workers
//! - outcome upsert with cumulative failure counting
//!
//! Two backends are provided: [`FifoUrlList`] for single-process in-memory
//! crawls, and [`DbUrlList`] for durable crawls shared by multiple workers
//! or processes.

mod db;
mod fifo;
mod record;
mod schema;

pub use db::DbUrlList;
pub use fifo::FifoUrlList;
pub use record::{ErrorKind, UrlRecord};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    /// No uncrawled entry exists
    #[error("queue is empty")]
    Empty,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid queue table name: {0}")]
    InvalidTable(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// A crawl queue: the engine's only view of pending and crawled URLs
///
/// Implementations own all queue state and must be safe for concurrent
/// callers. The contract:
///
/// - `insert_if_not_exists` adds a record when its URL is unseen and is a
///   no-op otherwise; it never fails for duplicates.
/// - `get_next_url` returns one pending entry and atomically marks it
///   dispatched; two concurrent calls must return distinct entries.
/// - `upsert` stores an outcome, creating the row if missing, and maintains
///   `num_errors`: one more than the stored value on a failure outcome,
///   zero on success.
#[async_trait]
pub trait UrlList: Send + Sync {
    /// Adds `record` unless its URL is already known
    async fn insert_if_not_exists(&self, record: UrlRecord) -> QueueResult<()>;

    /// Bulk form of [`insert_if_not_exists`](Self::insert_if_not_exists)
    ///
    /// Semantically equivalent to per-record insertion. Backends with a
    /// cheaper batched path override this; the default loops over single
    /// inserts so every implementation accepts the bulk call.
    async fn insert_if_not_exists_bulk(&self, records: Vec<UrlRecord>) -> QueueResult<()> {
        for record in records {
            self.insert_if_not_exists(record).await?;
        }
        Ok(())
    }

    /// Returns one pending entry, marking it dispatched
    ///
    /// Fails with [`QueueError::Empty`] when no pending entry exists.
    async fn get_next_url(&self) -> QueueResult<UrlRecord>;

    /// Stores the outcome for the record's URL, creating the row if missing
    async fn upsert(&self, record: UrlRecord) -> QueueResult<()>;
}
