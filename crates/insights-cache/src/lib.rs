#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache store adapter and backends for the insights data layer.
//!
//! [`CacheStore`] wraps any [`CacheBackend`] from `insights-core`:
//!
//! - [`SqliteBackend`] - Persistent SQLite-based cache (default, requires `sqlite` feature)
//! - [`InMemoryBackend`] - Simple in-memory cache
//! - [`NoopBackend`] - No-op cache that doesn't store anything

/// In-memory cache backend.
pub mod memory;
/// No-op cache backend.
pub mod noop;
/// Cache store adapter.
pub mod store;

/// SQLite-based cache backend.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use insights_core::CacheBackend;

// Re-export implementations
pub use memory::InMemoryBackend;
pub use noop::NoopBackend;
pub use store::CacheStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
