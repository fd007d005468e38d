//! Cache store adapter.
//!
//! [`CacheStore`] is the only way the rest of the workspace talks to a cache.
//! It owns JSON (de)serialization, encodes "don't cache" as an explicit branch
//! (a TTL of zero or less never reaches the backend) and turns backend
//! failures into misses so an unreachable cache never fails a caller.

use insights_core::{CacheBackend, DataError};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Typed, failure-tolerant front of a [`CacheBackend`].
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Returns the cached value for `key`, or `None` on miss.
    ///
    /// An unreachable backend and an undecodable entry are both treated as a
    /// miss; the undecodable entry is also deleted.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %unavailable(e), "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl_seconds`.
    ///
    /// Returns false without touching the backend when `ttl_seconds <= 0`.
    /// Also returns false if serialization or the backend write fails.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_seconds: i64) -> bool {
        if ttl_seconds <= 0 {
            debug!(key, ttl_seconds, "Not caching: TTL is not positive");
            return false;
        }

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };

        let ttl = Duration::from_secs(ttl_seconds.unsigned_abs());
        match self.backend.set(key, &raw, ttl).await {
            Ok(()) => {
                debug!(key, ttl_seconds, bytes = raw.len(), "Cached value");
                true
            }
            Err(e) => {
                warn!(key, error = %unavailable(e), "Cache write failed");
                false
            }
        }
    }

    /// Removes `key`. Returns true if an entry was removed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key, error = %unavailable(e), "Cache delete failed");
                false
            }
        }
    }

    /// Returns true if a live entry exists for `key`.
    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key, error = %unavailable(e), "Cache lookup failed");
                false
            }
        }
    }

    /// Removes every key matching `pattern` (see
    /// [`CacheKeys::pattern`](insights_core::CacheKeys::pattern)).
    ///
    /// Returns the number of entries removed.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        match self.backend.delete_matching(pattern).await {
            Ok(removed) => {
                debug!(pattern, removed, "Invalidated cache entries");
                removed
            }
            Err(e) => {
                warn!(pattern, error = %unavailable(e), "Cache invalidation failed");
                0
            }
        }
    }

    /// Removes expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.backend.purge_expired().await.unwrap_or_else(|e| {
            warn!(error = %unavailable(e), "Cache purge failed");
            0
        })
    }

    /// Clears every entry. Returns false if the backend could not be cleared.
    pub async fn clear(&self) -> bool {
        match self.backend.clear().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %unavailable(e), "Cache clear failed");
                false
            }
        }
    }
}

fn unavailable(e: DataError) -> DataError {
    match e {
        DataError::CacheUnavailable(_) => e,
        other => DataError::CacheUnavailable(other.to_string()),
    }
}
