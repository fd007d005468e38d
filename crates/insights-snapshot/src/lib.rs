#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Category snapshots for the insights data layer.
//!
//! A run has three timed phases:
//!
//! 1. **Prefetch** - one [`DataManager`](insights_manager::DataManager)
//!    prefetch for everything the category's calculator needs
//! 2. **Calculate** - the registered [`CategoryCalculator`] computes its
//!    metrics and composite score
//! 3. **Persist** - the [`SnapshotDocument`] is upserted into a
//!    [`DocumentStore`] and the `insights:{category}:latest` cache entry is
//!    refreshed
//!
//! # Example
//!
//! ```rust,ignore
//! use insights_snapshot::{CategoryRegistry, InMemoryDocumentStore, SnapshotPipeline};
//! use std::sync::Arc;
//!
//! let registry = CategoryRegistry::new().with(Arc::new(VolatilityCalculator::default()));
//! let pipeline = SnapshotPipeline::new(manager, Arc::new(registry), Arc::new(InMemoryDocumentStore::new()));
//!
//! let run = pipeline.run("volatility").await?;
//! println!("{:?} in {:.2}s", run.status, run.timing.total_seconds);
//! ```

/// Calculator trait and registry.
pub mod calculator;
/// Persisted snapshot document.
pub mod document;
/// Error types.
pub mod error;
/// Snapshot pipeline.
pub mod pipeline;
/// Calculator results.
pub mod result;
/// Document stores.
pub mod store;

pub use calculator::{CategoryCalculator, CategoryRegistry};
pub use document::SnapshotDocument;
pub use error::{Result, SnapshotError};
pub use pipeline::{LATEST_TTL_SECONDS, PhaseTiming, RunStatus, SnapshotPipeline, SnapshotRun};
pub use result::{CategoryResult, MetricResult, Status};
pub use store::{DocumentStore, InMemoryDocumentStore};

#[cfg(feature = "sqlite")]
pub use store::SqliteDocumentStore;
