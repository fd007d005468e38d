//! Error types for the snapshot pipeline.

use insights_core::DataError;
use thiserror::Error;

/// Result type alias using [`SnapshotError`].
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors that fail a snapshot run or a snapshot read.
///
/// Prefetch failures never appear here; they degrade the run instead.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// No calculator is registered under this category id.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// The category calculator failed.
    #[error("Calculation failed for {category_id}: {source}")]
    Calculation {
        /// Category being computed.
        category_id: String,
        /// Underlying error.
        #[source]
        source: DataError,
    },

    /// The calculator produced scores outside `[0, 100]`.
    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// The document store rejected the snapshot.
    #[error("Failed to persist snapshot for {category_id}: {source}")]
    Persist {
        /// Category being persisted.
        category_id: String,
        /// Underlying error.
        #[source]
        source: DataError,
    },

    /// The document store could not be queried.
    #[error("Failed to query snapshots for {category_id}: {source}")]
    Query {
        /// Category being read.
        category_id: String,
        /// Underlying error.
        #[source]
        source: DataError,
    },
}
