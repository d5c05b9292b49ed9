//! Durable SQLite queue backend
//!
//! This backend supports several workers, in one process or many, sharing a
//! single queue. Dequeue uses an optimistic conditional update so no long
//! transaction is held:
//!
//! 1. select the row with the smallest `id` where `crawled = 0`
//! 2. `UPDATE ... SET crawled = 1 WHERE id = ? AND crawled = 0`
//! 3. zero affected rows means another worker won the race; retry from 1
//! 4. otherwise the selected row is the dequeued entry

use crate::queue::record::{ErrorKind, UrlRecord};
use crate::queue::schema::initialize_schema;
use crate::queue::{QueueError, QueueResult, UrlList};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Default queue table name
pub const DEFAULT_TABLE: &str = "url";

/// Computes the dedup key for a URL: its SHA-1 digest, hex-encoded
fn url_hash(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Durable [`UrlList`] over a SQLite table
///
/// The table is created on first use; WAL journaling lets multiple
/// processes share the database file. Every entry is keyed by the SHA-1
/// hash of its URL, so inserts are idempotent, and the monotonic row id
/// gives FIFO dequeue order.
pub struct DbUrlList {
    conn: Mutex<Connection>,
    table: String,
    schema_ready: AtomicBool,
    /// Reserved knob for a future retry pass; dequeue does not consult it,
    /// so failed URLs stay dispatched and are not retried.
    initial_retry_time: Option<Duration>,
}

impl DbUrlList {
    /// Opens (or creates) a queue at `path` using the default table name
    pub fn open(path: &Path) -> QueueResult<Self> {
        Self::open_with_table(path, DEFAULT_TABLE)
    }

    /// Opens (or creates) a queue at `path` with a custom table name
    ///
    /// The table name is interpolated into SQL and therefore restricted to
    /// alphanumerics and underscores.
    pub fn open_with_table(path: &Path, table: &str) -> QueueResult<Self> {
        validate_table_name(table)?;
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            schema_ready: AtomicBool::new(false),
            initial_retry_time: None,
        })
    }

    /// Creates an in-memory queue (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: DEFAULT_TABLE.to_string(),
            schema_ready: AtomicBool::new(false),
            initial_retry_time: None,
        })
    }

    /// Sets the reserved retry interval
    pub fn with_initial_retry_time(mut self, interval: Duration) -> Self {
        self.initial_retry_time = Some(interval);
        self
    }

    /// The reserved retry interval, if configured
    pub fn initial_retry_time(&self) -> Option<Duration> {
        self.initial_retry_time
    }

    /// Creates the table on first access; later calls skip the check
    fn ensure_schema(&self, conn: &Connection) -> QueueResult<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        initialize_schema(conn, &self.table)?;
        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UrlRecord> {
        let error_code: Option<String> = row.get(3)?;
        Ok(UrlRecord {
            url: row.get(1)?,
            status_code: row.get(2)?,
            error_code: error_code.as_deref().and_then(ErrorKind::from_db_string),
            error_message: row.get(4)?,
            num_errors: row.get(5)?,
        })
    }
}

/// Table names are interpolated into SQL, so keep them boring
fn validate_table_name(table: &str) -> QueueResult<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QueueError::InvalidTable(table.to_string()))
    }
}

#[async_trait]
impl UrlList for DbUrlList {
    async fn insert_if_not_exists(&self, record: UrlRecord) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        self.ensure_schema(&conn)?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (url_hash, url, status_code, error_code, error_message, num_errors, crawled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                self.table
            ),
            params![
                url_hash(&record.url),
                record.url,
                record.status_code,
                record.error_code.map(ErrorKind::to_db_string),
                record.error_message,
                record.num_errors,
            ],
        )?;
        Ok(())
    }

    async fn insert_if_not_exists_bulk(&self, records: Vec<UrlRecord>) -> QueueResult<()> {
        let mut conn = self.conn.lock().unwrap();
        self.ensure_schema(&conn)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} (url_hash, url, status_code, error_code, error_message, num_errors, crawled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                self.table
            ))?;
            for record in &records {
                stmt.execute(params![
                    url_hash(&record.url),
                    record.url,
                    record.status_code,
                    record.error_code.map(ErrorKind::to_db_string),
                    record.error_message,
                    record.num_errors,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_next_url(&self) -> QueueResult<UrlRecord> {
        let conn = self.conn.lock().unwrap();
        self.ensure_schema(&conn)?;

        loop {
            let selected: Option<(i64, UrlRecord)> = conn
                .query_row(
                    &format!(
                        "SELECT id, url, status_code, error_code, error_message, num_errors
                         FROM {} WHERE crawled = 0 ORDER BY id ASC LIMIT 1",
                        self.table
                    ),
                    [],
                    |row| Ok((row.get(0)?, Self::row_to_record(row)?)),
                )
                .optional()?;

            let (id, record) = match selected {
                Some(found) => found,
                None => return Err(QueueError::Empty),
            };

            let claimed = conn.execute(
                &format!(
                    "UPDATE {} SET crawled = 1 WHERE id = ?1 AND crawled = 0",
                    self.table
                ),
                params![id],
            )?;

            // Zero affected rows means another worker claimed this entry
            // between our select and update; go again.
            if claimed > 0 {
                return Ok(record);
            }
        }
    }

    async fn upsert(&self, record: UrlRecord) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        self.ensure_schema(&conn)?;

        let hash = url_hash(&record.url);
        let num_errors: u32 = if record.is_failure() {
            let previous: Option<u32> = conn
                .query_row(
                    &format!("SELECT num_errors FROM {} WHERE url_hash = ?1", self.table),
                    params![hash],
                    |row| row.get(0),
                )
                .optional()?;
            previous.unwrap_or(0) + 1
        } else {
            0
        };

        conn.execute(
            &format!(
                "INSERT INTO {} (url_hash, url, status_code, error_code, error_message, num_errors, crawled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                 ON CONFLICT(url_hash) DO UPDATE SET
                     status_code = excluded.status_code,
                     error_code = excluded.error_code,
                     error_message = excluded.error_message,
                     num_errors = excluded.num_errors,
                     crawled = excluded.crawled",
                self.table
            ),
            params![
                hash,
                record.url,
                record.status_code,
                record.error_code.map(ErrorKind::to_db_string),
                record.error_message,
                num_errors,
            ],
        )?;
        Ok(())
    }
}
