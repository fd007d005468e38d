#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the insights data layer.
//!
//! This crate provides the foundational abstractions shared by every other crate:
//!
//! - [`Granularity`](granularity::Granularity) - Time resolution and its caching policy
//! - [`CacheKeys`](keys::CacheKeys) - Deterministic cache key construction and parsing
//! - [`MarketDataProvider`](provider::MarketDataProvider) - Upstream market data source
//! - [`CacheBackend`](cache::CacheBackend) - Key-value store with TTL
//! - [`StaticProvider`](fixture::StaticProvider) - Canned provider for tests and offline runs

/// Key-value cache backend trait.
pub mod cache;
/// Error types for data operations.
pub mod error;
/// Canned provider serving fixed payloads.
pub mod fixture;
/// Granularity definitions and the caching policy table.
pub mod granularity;
/// Cache key construction and parsing.
pub mod keys;
/// Upstream market data provider trait.
pub mod provider;
/// Core data types (Symbol, OhlcvBar, TreasuryPoint, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::CacheBackend;
pub use error::{DataError, Result};
pub use fixture::StaticProvider;
pub use granularity::Granularity;
pub use keys::{ALL_TOPICS, CacheKeys, LATEST_SUFFIX, ParsedKey};
pub use provider::MarketDataProvider;
pub use types::{
    IndicatorPoint, IpoListing, NewsArticle, OhlcvBar, RawBar, RawPoint, Symbol, TreasuryPoint,
    bars_to_frame,
};
