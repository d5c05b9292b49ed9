//! Queue table DDL

/// Builds the DDL for a queue table with the given name
///
/// Layout: a monotonic `id` for FIFO ordering, a unique `url_hash` dedup
/// key, the outcome columns, and an indexed `crawled` flag driving dequeue.
pub fn table_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url_hash TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    status_code INTEGER,
    error_code TEXT,
    error_message TEXT,
    num_errors INTEGER NOT NULL DEFAULT 0,
    crawled INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_{table}_crawled ON {table}(crawled);
"#
    )
}

/// Initializes the queue schema on a connection
pub fn initialize_schema(conn: &rusqlite::Connection, table: &str) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&table_sql(table))
}
