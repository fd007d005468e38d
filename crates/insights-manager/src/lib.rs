#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cache-aside data manager for the insights data layer.
//!
//! - [`DataManager`] - Cache-aside getters per data domain plus a bounded
//!   concurrent prefetch
//! - [`PrefetchRequest`] - What a batch of consumers needs
//! - [`SharedDataContext`] - What the prefetch produced, and what failed

/// Shared data context.
pub mod context;
/// Data manager.
pub mod manager;
/// Payload validation.
pub mod normalize;
/// Prefetch requests.
pub mod request;

pub use context::{FetchedData, SharedDataContext};
pub use manager::{CacheTtls, DEFAULT_MAX_CONCURRENCY, DataManager};
pub use request::{PrefetchItem, PrefetchRequest};
