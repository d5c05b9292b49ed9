//! In-memory FIFO queue backend

use crate::queue::{QueueError, QueueResult, UrlList, UrlRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

struct FifoEntry {
    record: UrlRecord,
    crawled: bool,
}

struct FifoInner {
    /// Append-only sequence in insertion order
    entries: Vec<FifoEntry>,
    /// URL -> position in `entries`, the dedup key
    index: HashMap<String, usize>,
    /// Next dequeue candidate
    cursor: usize,
}

/// In-memory [`UrlList`]: insertion-ordered and deduplicated
///
/// Suitable for single-process crawls that do not need to resume. Dequeue
/// is serialised by an internal mutex; the queue is not shareable across
/// processes.
pub struct FifoUrlList {
    inner: Mutex<FifoInner>,
}

impl FifoUrlList {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FifoInner {
                entries: Vec::new(),
                index: HashMap::new(),
                cursor: 0,
            }),
        }
    }

    /// Number of entries ever inserted (crawled or not)
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Whether the queue holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FifoUrlList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlList for FifoUrlList {
    async fn insert_if_not_exists(&self, record: UrlRecord) -> QueueResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.index.contains_key(&record.url) {
            return Ok(());
        }
        let position = inner.entries.len();
        inner.index.insert(record.url.clone(), position);
        inner.entries.push(FifoEntry {
            record,
            crawled: false,
        });
        Ok(())
    }

    async fn get_next_url(&self) -> QueueResult<UrlRecord> {
        let mut inner = self.inner.lock().unwrap();
        while inner.cursor < inner.entries.len() {
            let position = inner.cursor;
            inner.cursor += 1;
            let entry = &mut inner.entries[position];
            if !entry.crawled {
                entry.crawled = true;
                return Ok(entry.record.clone());
            }
        }
        Err(QueueError::Empty)
    }

    async fn upsert(&self, mut record: UrlRecord) -> QueueResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.index.get(&record.url).copied() {
            Some(position) => {
                let entry = &mut inner.entries[position];
                record.num_errors = if record.is_failure() {
                    entry.record.num_errors + 1
                } else {
                    0
                };
                entry.record = record;
                entry.crawled = true;
            }
            None => {
                record.num_errors = if record.is_failure() { 1 } else { 0 };
                let position = inner.entries.len();
                inner.index.insert(record.url.clone(), position);
                inner.entries.push(FifoEntry {
                    record,
                    crawled: true,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ErrorKind;

    #[tokio::test]
    async fn test_round_trip() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/"))
            .await
            .unwrap();

        let next = list.get_next_url().await.unwrap();
        assert_eq!(next.url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_empty_queue_fails() {
        let list = FifoUrlList::new();
        assert!(matches!(list.get_next_url().await, Err(QueueError::Empty)));
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let list = FifoUrlList::new();
        for _ in 0..5 {
            list.insert_if_not_exists(UrlRecord::new("https://example.com/"))
                .await
                .unwrap();
        }

        assert_eq!(list.len(), 1);
        list.get_next_url().await.unwrap();
        assert!(matches!(list.get_next_url().await, Err(QueueError::Empty)));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/a"))
            .await
            .unwrap();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/b"))
            .await
            .unwrap();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/c"))
            .await
            .unwrap();

        assert_eq!(list.get_next_url().await.unwrap().url, "https://example.com/a");
        assert_eq!(list.get_next_url().await.unwrap().url, "https://example.com/b");
        assert_eq!(list.get_next_url().await.unwrap().url, "https://example.com/c");
    }

    #[tokio::test]
    async fn test_each_entry_dequeued_once() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/"))
            .await
            .unwrap();

        assert!(list.get_next_url().await.is_ok());
        assert!(matches!(list.get_next_url().await, Err(QueueError::Empty)));
    }

    #[tokio::test]
    async fn test_bulk_insert_matches_single() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists_bulk(vec![
            UrlRecord::new("https://example.com/a"),
            UrlRecord::new("https://example.com/b"),
            UrlRecord::new("https://example.com/a"),
        ])
        .await
        .unwrap();

        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_failure_increments_num_errors() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/"))
            .await
            .unwrap();
        list.get_next_url().await.unwrap();

        list.upsert(UrlRecord::failure(
            "https://example.com/",
            ErrorKind::RequestError,
            "connect refused",
            None,
        ))
        .await
        .unwrap();

        list.upsert(UrlRecord::failure(
            "https://example.com/",
            ErrorKind::RequestError,
            "connect refused",
            None,
        ))
        .await
        .unwrap();

        let inner = list.inner.lock().unwrap();
        assert_eq!(inner.entries[0].record.num_errors, 2);
    }

    #[tokio::test]
    async fn test_upsert_success_resets_num_errors() {
        let list = FifoUrlList::new();
        list.insert_if_not_exists(UrlRecord::new("https://example.com/"))
            .await
            .unwrap();
        list.get_next_url().await.unwrap();

        list.upsert(UrlRecord::failure(
            "https://example.com/",
            ErrorKind::RequestError,
            "timeout",
            None,
        ))
        .await
        .unwrap();
        list.upsert(UrlRecord::success("https://example.com/", 200))
            .await
            .unwrap();

        let inner = list.inner.lock().unwrap();
        assert_eq!(inner.entries[0].record.num_errors, 0);
        assert_eq!(inner.entries[0].record.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_row() {
        let list = FifoUrlList::new();
        list.upsert(UrlRecord::success("https://example.com/", 200))
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        // A row created by upsert already carries an outcome and is not
        // re-dispatched.
        assert!(matches!(list.get_next_url().await, Err(QueueError::Empty)));
    }
}
