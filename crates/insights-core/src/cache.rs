//! Cache backend trait for storing serialized payloads.
//!
//! This module defines the [`CacheBackend`] trait: a plain key-value store with
//! per-entry TTL operating on opaque string keys built by
//! [`CacheKeys`](crate::keys::CacheKeys). Policy (what to cache, for how long,
//! and what a failure means) lives in the adapter above it, not here.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Key-value store with TTL.
///
/// Implementations can store data in various backends (SQLite, in-memory, etc.).
/// Expired entries must never be returned by [`get`](Self::get) or reported by
/// [`exists`](Self::exists), whether or not they have been purged yet.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Returns the stored value for `key`, or `Ok(None)` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Removes `key`. Returns true if an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Returns true if a live entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Removes every key matching a `domain:type:*` pattern.
    ///
    /// Returns the number of entries removed.
    async fn delete_matching(&self, pattern: &str) -> Result<usize>;

    /// Removes expired entries.
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
