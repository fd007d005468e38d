//! In-memory cache backend.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use insights_core::{CacheBackend, CacheKeys, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with its expiry time.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            value,
            expires_at: Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Simple in-memory cache for tests, development and single-process deployments.
///
/// Entries are stored in a `RwLock`-protected `HashMap` and are lost when the
/// backend is dropped. Expired entries are hidden immediately and removed on
/// the next write to the same key or by [`purge_expired`](CacheBackend::purge_expired).
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| entry.is_live(Utc::now())))
    }

    #[instrument(skip(self))]
    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !CacheKeys::matches_pattern(pattern, key));
        Ok(before - entries.len())
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_set_get() {
        let backend = InMemoryBackend::new();
        assert!(backend.get("market:daily:AAPL").await.unwrap().is_none());

        backend
            .set("market:daily:AAPL", "[1,2]", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            backend.get("market:daily:AAPL").await.unwrap().as_deref(),
            Some("[1,2]")
        );
        assert!(backend.exists("market:daily:AAPL").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_backend_expiry() {
        let backend = InMemoryBackend::new();
        backend
            .set("macro:treasury:10year", "[]", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(backend.get("macro:treasury:10year").await.unwrap().is_none());
        assert!(!backend.exists("macro:treasury:10year").await.unwrap());
        assert_eq!(backend.len().await, 1);

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_backend_overwrite_is_last_writer_wins() {
        let backend = InMemoryBackend::new();
        let ttl = Duration::from_secs(60);
        backend.set("insights:stress:latest", "1", ttl).await.unwrap();
        backend.set("insights:stress:latest", "2", ttl).await.unwrap();
        assert_eq!(
            backend.get("insights:stress:latest").await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_memory_backend_clear() {
        let backend = InMemoryBackend::new();
        backend
            .set("macro:ipo:calendar", "[]", Duration::from_secs(60))
            .await
            .unwrap();
        backend.clear().await.unwrap();
        assert!(backend.is_empty().await);
    }
}
