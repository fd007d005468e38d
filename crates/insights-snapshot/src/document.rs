//! The persisted snapshot.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::result::{CategoryResult, MetricResult, Status};

/// One category's snapshot for one day.
///
/// The same payload is stored in the document store and in the fast-path
/// cache. At most one document exists per `(category_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Category id.
    pub category_id: String,
    /// Snapshot day, as midnight UTC.
    pub date: DateTime<Utc>,
    /// Composite score in `[0, 100]`.
    pub composite_score: f64,
    /// Band of the composite score.
    pub composite_status: Status,
    /// Per-metric scores keyed by metric id.
    pub metrics: BTreeMap<String, MetricResult>,
    /// When this document was written.
    pub updated_at: DateTime<Utc>,
}

impl SnapshotDocument {
    /// Build the document for `category_id` on `date` from a calculator result.
    #[must_use]
    pub fn from_result(
        category_id: &str,
        date: NaiveDate,
        result: CategoryResult,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category_id: category_id.trim().to_lowercase(),
            date: day_start(date),
            composite_score: result.composite_score,
            composite_status: result.composite_status,
            metrics: result.metrics,
            updated_at,
        }
    }

    /// Snapshot day.
    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// Midnight UTC of `date`.
#[must_use]
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let result = CategoryResult::new(62.5, Status::Elevated)
            .with_metric("vix", MetricResult::new(70.0, Status::Elevated));
        let doc = SnapshotDocument::from_result("Volatility", date, result, day_start(date));

        let json: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["category_id"], "volatility");
        assert_eq!(json["date"], "2024-03-01T00:00:00Z");
        assert_eq!(json["composite_status"], "elevated");
        assert_eq!(json["metrics"]["vix"]["score"], 70.0);
        assert_eq!(doc.day(), date);
    }
}
