//! SQLite-based cache backend.

use async_trait::async_trait;
use chrono::Utc;
use insights_core::{CacheBackend, DataError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based key-value cache.
///
/// Entries live in a single `kv_cache` table with an absolute expiry in epoch
/// milliseconds, so the cache survives restarts and can be shared by several
/// processes on one host.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::CacheUnavailable(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DataError::CacheUnavailable(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_cache (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kv_cache_expires_at ON kv_cache(expires_at)",
            [],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl)
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM kv_cache WHERE key = ?1 AND expires_at > ?2",
            params![key, now_millis()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| DataError::Cache(e.to_string()))
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_cache (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expiry_millis(ttl)],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM kv_cache WHERE key = ?1", params![key])
            .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM kv_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now_millis()],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        let conn = self.lock()?;
        // Prefix comparison via substr avoids LIKE treating `_` in keys as a wildcard.
        let deleted = match pattern.strip_suffix('*') {
            Some(prefix) => conn.execute(
                "DELETE FROM kv_cache WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            ),
            None => conn.execute("DELETE FROM kv_cache WHERE key = ?1", params![pattern]),
        }
        .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM kv_cache WHERE expires_at <= ?1",
                params![now_millis()],
            )
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if deleted > 0 {
            debug!("Purged {} expired cache entries", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_cache", [])
            .map_err(|e| DataError::Cache(e.to_string()))?;
        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::CacheKeys;

    #[tokio::test]
    async fn test_sqlite_backend_initialization() {
        let cache = SqliteBackend::in_memory();
        assert!(cache.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_backend_set_get() {
        let cache = SqliteBackend::in_memory().unwrap();
        let key = CacheKeys::market("daily", "AAPL");

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.set(&key, "[]", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("[]"));
        assert!(cache.exists(&key).await.unwrap());
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_backend_expired_entries_are_hidden() {
        let cache = SqliteBackend::in_memory().unwrap();
        cache
            .set("macro:ipo:calendar", "[]", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("macro:ipo:calendar").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_backend_pattern_delete_treats_underscore_literally() {
        let cache = SqliteBackend::in_memory().unwrap();
        let ttl = Duration::from_secs(60);
        cache.set("insights:market_stress:latest", "1", ttl).await.unwrap();
        cache.set("insights:marketxstress:latest", "2", ttl).await.unwrap();

        let removed = cache
            .delete_matching(&CacheKeys::pattern("insights", "market_stress"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(cache.exists("insights:marketxstress:latest").await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_backend_clear() {
        let cache = SqliteBackend::in_memory().unwrap();
        cache
            .set("macro:treasury:2year", "[]", Duration::from_secs(60))
            .await
            .unwrap();
        cache.clear().await.unwrap();
        assert!(!cache.exists("macro:treasury:2year").await.unwrap());
    }
}
