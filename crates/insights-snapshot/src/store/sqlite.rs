use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use insights_core::{DataError, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

use super::DocumentStore;
use crate::document::{SnapshotDocument, day_start};

const COLUMNS: &str =
    "category_id, date, composite_score, composite_status, metrics, updated_at";

/// SQLite-backed document store.
///
/// Documents live in a `snapshots` table with a `UNIQUE(category_id, date)`
/// constraint; writes go through `INSERT .. ON CONFLICT DO UPDATE`, so two
/// runs for the same day converge on one row. The row id never leaves the
/// store. Dates are stored as epoch milliseconds.
#[derive(Debug)]
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::Storage(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create a store in memory.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataError::Storage(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id TEXT NOT NULL,
                date INTEGER NOT NULL,
                composite_score REAL NOT NULL,
                composite_status TEXT NOT NULL,
                metrics TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(category_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_category_date
                ON snapshots(category_id, date DESC);",
        )
        .map_err(|e| DataError::Storage(e.to_string()))?;

        debug!("SQLite snapshot schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DataError::Storage(format!("connection lock poisoned: {e}")))
    }
}

fn normalize(category_id: &str) -> String {
    category_id.trim().to_lowercase()
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DataError::Storage(format!("timestamp out of range: {ms}")))
}

/// Raw column values; decoded outside the rusqlite row callback.
struct StoredRow {
    category_id: String,
    date: i64,
    composite_score: f64,
    composite_status: String,
    metrics: String,
    updated_at: i64,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category_id: row.get(0)?,
            date: row.get(1)?,
            composite_score: row.get(2)?,
            composite_status: row.get(3)?,
            metrics: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<SnapshotDocument> {
        Ok(SnapshotDocument {
            category_id: self.category_id,
            date: from_millis(self.date)?,
            composite_score: self.composite_score,
            composite_status: self.composite_status.parse()?,
            metrics: serde_json::from_str(&self.metrics)
                .map_err(|e| DataError::Storage(format!("corrupt metrics column: {e}")))?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, document), fields(category = %document.category_id, date = %document.date))]
    async fn upsert(&self, document: &SnapshotDocument) -> Result<()> {
        let metrics = serde_json::to_string(&document.metrics)
            .map_err(|e| DataError::Storage(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots
                (category_id, date, composite_score, composite_status, metrics, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category_id, date) DO UPDATE SET
                composite_score = excluded.composite_score,
                composite_status = excluded.composite_status,
                metrics = excluded.metrics,
                updated_at = excluded.updated_at",
            params![
                normalize(&document.category_id),
                to_millis(document.date),
                document.composite_score,
                document.composite_status.as_str(),
                metrics,
                to_millis(document.updated_at),
            ],
        )
        .map_err(|e| DataError::Storage(e.to_string()))?;

        debug!("Snapshot upserted");
        Ok(())
    }

    async fn find_one(
        &self,
        category_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SnapshotDocument>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM snapshots WHERE category_id = ?1 AND date = ?2"),
                params![normalize(category_id), to_millis(day_start(date))],
                StoredRow::read,
            )
            .optional()
            .map_err(|e| DataError::Storage(e.to_string()))?
        };
        row.map(StoredRow::decode).transpose()
    }

    async fn find_latest(&self, category_id: &str) -> Result<Option<SnapshotDocument>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM snapshots WHERE category_id = ?1
                     ORDER BY date DESC LIMIT 1"
                ),
                params![normalize(category_id)],
                StoredRow::read,
            )
            .optional()
            .map_err(|e| DataError::Storage(e.to_string()))?
        };
        row.map(StoredRow::decode).transpose()
    }

    async fn find_since(
        &self,
        category_id: &str,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<SnapshotDocument>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {COLUMNS} FROM snapshots WHERE category_id = ?1 AND date >= ?2
                     ORDER BY date DESC LIMIT ?3"
                ))
                .map_err(|e| DataError::Storage(e.to_string()))?;
            stmt.query_map(
                params![normalize(category_id), to_millis(since), limit],
                StoredRow::read,
            )
            .map_err(|e| DataError::Storage(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DataError::Storage(e.to_string()))?
        };
        rows.into_iter().map(StoredRow::decode).collect()
    }

    async fn count(&self, category_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM snapshots WHERE category_id = ?1",
                params![normalize(category_id)],
                |row| row.get(0),
            )
            .map_err(|e| DataError::Storage(e.to_string()))?;
        usize::try_from(count).map_err(|e| DataError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{CategoryResult, MetricResult, Status};

    fn doc(day: u32, score: f64) -> SnapshotDocument {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        SnapshotDocument::from_result(
            "volatility",
            date,
            CategoryResult::new(score, Status::Normal)
                .with_metric("vix", MetricResult::new(score, Status::Normal).with_detail("fresh")),
            day_start(date),
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_day() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        store.upsert(&doc(1, 30.0)).await.unwrap();
        store.upsert(&doc(1, 35.0)).await.unwrap();
        store.upsert(&doc(2, 50.0)).await.unwrap();

        assert_eq!(store.count("volatility").await.unwrap(), 2);
        let first = store
            .find_one("volatility", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, doc(1, 35.0));
    }

    #[tokio::test]
    async fn test_latest_and_since() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        for day in 1..=4 {
            store.upsert(&doc(day, f64::from(day) * 10.0)).await.unwrap();
        }

        let latest = store.find_latest("VOLATILITY").await.unwrap().unwrap();
        assert_eq!(latest.composite_score, 40.0);

        let since = day_start(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        let recent = store.find_since("volatility", since, None).await.unwrap();
        let days: Vec<u32> = recent.iter().map(|d| chrono::Datelike::day(&d.day())).collect();
        assert_eq!(days, vec![4, 3, 2]);

        let limited = store.find_since("volatility", since, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert!(store.find_latest("rates").await.unwrap().is_none());
    }
}
