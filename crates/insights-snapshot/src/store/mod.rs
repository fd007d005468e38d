//! Document stores for snapshots.
//!
//! - [`InMemoryDocumentStore`] - Process-local store
//! - [`SqliteDocumentStore`] - Durable store (requires `sqlite` feature)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use insights_core::Result;
use std::fmt::Debug;

use crate::document::SnapshotDocument;

/// In-memory document store.
pub mod memory;
/// SQLite document store.
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryDocumentStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;

/// Storage for [`SnapshotDocument`]s, unique per `(category_id, date)`.
///
/// Implementations must upsert atomically so that concurrent writers for the
/// same key converge on one document, last write winning.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Insert `document`, or replace the one with the same category and date.
    async fn upsert(&self, document: &SnapshotDocument) -> Result<()>;

    /// The document for `category_id` on `date`.
    async fn find_one(
        &self,
        category_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SnapshotDocument>>;

    /// The most recent document for `category_id`.
    async fn find_latest(&self, category_id: &str) -> Result<Option<SnapshotDocument>>;

    /// Documents for `category_id` dated `since` or later, newest first.
    async fn find_since(
        &self,
        category_id: &str,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<SnapshotDocument>>;

    /// Number of documents stored for `category_id`.
    async fn count(&self, category_id: &str) -> Result<usize>;
}
