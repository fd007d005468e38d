//! No-op cache backend.

use async_trait::async_trait;
use insights_core::{CacheBackend, Result};
use std::time::Duration;
use tracing::trace;

/// A no-op backend that doesn't store anything.
///
/// Every `get` misses and every `set` succeeds without storing.
/// Useful for disabling caching or testing code paths without cache hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl NoopBackend {
    /// Create a new no-op backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheBackend for NoopBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        trace!("NoopBackend: get called, returning None");
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        trace!("NoopBackend: set called, doing nothing");
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<usize> {
        Ok(0)
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_backend_never_stores() {
        let backend = NoopBackend::new();
        backend
            .set("market:daily:AAPL", "[]", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(backend.get("market:daily:AAPL").await.unwrap().is_none());
        assert!(!backend.exists("market:daily:AAPL").await.unwrap());
    }
}
