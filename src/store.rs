//! Embedded SQLite store for parsed records.
//!
//! One table, indexed by timestamp, created on first open. WAL mode so the
//! engine's writes and the per-tick window queries can overlap. The engine is
//! the sole writer; readers may be concurrent.

use crate::record::{LogLevel, LogRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Record store handle; cheap to clone, shared across engine tasks.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(5) // SQLite serializes writes internally
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open record store at {}", path.display()))?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// In-memory store for tests. Single connection, since each SQLite
    /// `:memory:` connection is its own database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory record store")?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 timestamp INTEGER NOT NULL,
                 message TEXT NOT NULL,
                 level TEXT NOT NULL,
                 status_code INTEGER NOT NULL,
                 latency_ms INTEGER NOT NULL,
                 endpoint TEXT NOT NULL,
                 fields TEXT NOT NULL
             )",
        )
        .execute(pool)
        .await
        .context("Failed to create records table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp)")
            .execute(pool)
            .await
            .context("Failed to create timestamp index")?;

        Ok(())
    }

    /// Append one record.
    pub async fn insert(&self, record: &LogRecord) -> Result<()> {
        let fields_json =
            serde_json::to_string(&record.fields).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            "INSERT INTO records (timestamp, message, level, status_code, latency_ms, endpoint, fields)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.timestamp.timestamp_millis())
        .bind(&record.message)
        .bind(record.level.as_str())
        .bind(record.status_code as i64)
        .bind(record.latency.as_millis() as i64)
        .bind(&record.endpoint)
        .bind(fields_json)
        .execute(&self.pool)
        .await
        .context("Failed to insert record")?;

        Ok(())
    }

    /// All records with timestamp >= `since`, ascending, insertion order
    /// within equal timestamps.
    pub async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query(
            "SELECT timestamp, message, level, status_code, latency_ms, endpoint, fields
             FROM records
             WHERE timestamp >= ?
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .context("Failed to query records")?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    /// Records inside a rolling horizon ending now.
    pub async fn records_in_window(&self, horizon: Duration) -> Result<Vec<LogRecord>> {
        let horizon =
            chrono::Duration::from_std(horizon).context("window horizon out of range")?;
        self.records_since(Utc::now() - horizon).await
    }

    /// Delete records with timestamp < `older_than`; returns the count.
    pub async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE timestamp < ?")
            .bind(older_than.timestamp_millis())
            .execute(&self.pool)
            .await
            .context("Failed to prune records")?;

        Ok(result.rows_affected())
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: SqliteRow) -> LogRecord {
    let timestamp_ms: i64 = row.get("timestamp");
    let level: String = row.get("level");
    let fields_json: String = row.get("fields");

    LogRecord {
        timestamp: DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now),
        message: row.get("message"),
        level: LogLevel::parse(&level),
        status_code: row.get::<i64, _>("status_code") as u16,
        latency: Duration::from_millis(row.get::<i64, _>("latency_ms") as u64),
        endpoint: row.get("endpoint"),
        fields: serde_json::from_str(&fields_json).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record(timestamp: DateTime<Utc>, message: &str) -> LogRecord {
        let mut record = LogRecord::bare(timestamp, message.to_string(), LogLevel::Info);
        record.status_code = 200;
        record.latency = Duration::from_millis(12);
        record.endpoint = "/api/items".to_string();
        record.fields.insert("region".to_string(), json!("eu-west-1"));
        record
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields_and_order() {
        let store = RecordStore::open_in_memory().await.unwrap();

        let base = Utc::now();
        let records: Vec<LogRecord> = (0..5)
            .map(|i| sample_record(base + chrono::Duration::seconds(i), &format!("line {}", i)))
            .collect();

        for record in &records {
            store.insert(record).await.unwrap();
        }

        let loaded = store
            .records_since(DateTime::from_timestamp_millis(0).unwrap())
            .await
            .unwrap();

        assert_eq!(loaded.len(), 5);
        for (original, loaded) in records.iter().zip(&loaded) {
            assert_eq!(loaded.message, original.message);
            assert_eq!(loaded.level, original.level);
            assert_eq!(loaded.status_code, original.status_code);
            assert_eq!(loaded.latency, original.latency);
            assert_eq!(loaded.endpoint, original.endpoint);
            assert_eq!(loaded.fields, original.fields);
            assert_eq!(
                loaded.timestamp.timestamp_millis(),
                original.timestamp.timestamp_millis()
            );
        }
    }

    #[tokio::test]
    async fn test_latency_normalized_to_millis() {
        let store = RecordStore::open_in_memory().await.unwrap();

        let mut record = sample_record(Utc::now(), "precise");
        record.latency = Duration::from_micros(1500);
        store.insert(&record).await.unwrap();

        let loaded = store
            .records_since(DateTime::from_timestamp_millis(0).unwrap())
            .await
            .unwrap();
        assert_eq!(loaded[0].latency, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_prune_deletes_only_older() {
        let store = RecordStore::open_in_memory().await.unwrap();

        let now = Utc::now();
        store
            .insert(&sample_record(now - chrono::Duration::days(10), "old"))
            .await
            .unwrap();
        store.insert(&sample_record(now, "recent")).await.unwrap();

        let deleted = store.prune(now - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store
            .records_since(DateTime::from_timestamp_millis(0).unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "recent");
    }

    #[tokio::test]
    async fn test_records_in_window_excludes_outside() {
        let store = RecordStore::open_in_memory().await.unwrap();

        let now = Utc::now();
        store
            .insert(&sample_record(now - chrono::Duration::minutes(10), "outside"))
            .await
            .unwrap();
        store
            .insert(&sample_record(now - chrono::Duration::seconds(30), "inside"))
            .await
            .unwrap();

        let windowed = store
            .records_in_window(Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].message, "inside");
    }

    #[tokio::test]
    async fn test_open_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulsewatch.db");

        let store = RecordStore::open(&path).await.unwrap();
        store.insert(&sample_record(Utc::now(), "persisted")).await.unwrap();
        store.close().await;

        // Reopen and read back
        let store = RecordStore::open(&path).await.unwrap();
        let loaded = store
            .records_since(DateTime::from_timestamp_millis(0).unwrap())
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
