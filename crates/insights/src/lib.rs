#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Market-data caching, shared prefetch and category snapshots.
//!
//! This crate re-exports the workspace and adds what an application needs
//! to run it: [`InsightsConfig`] loaded from TOML, [`init_logging`], and
//! [`Insights`], which wires a provider, cache, [`DataManager`] and
//! [`DocumentStore`] together.
//!
//! # Features
//!
//! - `sqlite` - SQLite cache backend and document store (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use insights::{Granularity, Insights, InsightsConfig, PrefetchRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InsightsConfig::from_path("insights.toml")?;
//!     config.logging.init()?;
//!     let insights = Insights::from_config(config)?;
//!
//!     let ctx = insights
//!         .manager()
//!         .prefetch_shared(&PrefetchRequest::new().symbols(["SPY", "QQQ"]).treasury(["10year"]))
//!         .await;
//!     println!("SPY bars: {:?}", ctx.get_ohlcv("spy").map(<[_]>::len));
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use insights_core::*;

// Cache store and backends
#[cfg(feature = "sqlite")]
pub use insights_cache::SqliteBackend;
pub use insights_cache::{CacheStore, InMemoryBackend, NoopBackend};

// Data manager
pub use insights_manager::{
    CacheTtls, DataManager, FetchedData, PrefetchItem, PrefetchRequest, SharedDataContext,
};

// Snapshots
#[cfg(feature = "sqlite")]
pub use insights_snapshot::SqliteDocumentStore;
pub use insights_snapshot::{
    CategoryCalculator, CategoryRegistry, CategoryResult, DocumentStore, InMemoryDocumentStore,
    MetricResult, PhaseTiming, RunStatus, SnapshotDocument, SnapshotError, SnapshotPipeline,
    SnapshotRun, Status,
};

// Providers
pub use insights_alphavantage::AlphaVantageProvider;

mod app;
pub mod config;
pub mod logging;

pub use app::Insights;
pub use config::{API_KEY_ENV, ConfigError, InsightsConfig};
pub use logging::{LogFormat, init_logging};
