//! Calculator output types.

use insights_core::DataError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SnapshotError};

/// Qualitative band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Below the usual range.
    Low,
    /// Within the usual range.
    Normal,
    /// Above the usual range.
    Elevated,
    /// Well above the usual range.
    High,
}

impl Status {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = DataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "elevated" => Ok(Self::Elevated),
            "high" => Ok(Self::High),
            other => Err(DataError::Parse(format!("Unknown status: {other}"))),
        }
    }
}

/// Score of a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Score in `[0, 100]`.
    pub score: f64,
    /// Band of the score.
    pub status: Status,
    /// Explanation, e.g. why a metric could not be computed from degraded data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl MetricResult {
    /// A metric without detail.
    #[must_use]
    pub const fn new(score: f64, status: Status) -> Self {
        Self {
            score,
            status,
            detail: None,
        }
    }

    /// Attach an explanation.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Everything a calculator produces for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Weighted aggregate of the metric scores, in `[0, 100]`.
    pub composite_score: f64,
    /// Band of the composite score.
    pub composite_status: Status,
    /// Per-metric scores keyed by metric id.
    pub metrics: BTreeMap<String, MetricResult>,
}

impl CategoryResult {
    /// A result with no metrics yet.
    #[must_use]
    pub const fn new(composite_score: f64, composite_status: Status) -> Self {
        Self {
            composite_score,
            composite_status,
            metrics: BTreeMap::new(),
        }
    }

    /// Add a metric.
    #[must_use]
    pub fn with_metric(mut self, metric_id: impl Into<String>, metric: MetricResult) -> Self {
        self.metrics.insert(metric_id.into(), metric);
        self
    }

    /// Checks that every score is finite and within `[0, 100]`.
    ///
    /// # Errors
    /// Returns [`SnapshotError::InvalidResult`] naming the first bad score.
    pub fn validate(&self) -> Result<()> {
        check_score("composite", self.composite_score)?;
        for (metric_id, metric) in &self.metrics {
            check_score(metric_id, metric.score)?;
        }
        Ok(())
    }
}

fn check_score(name: &str, score: f64) -> Result<()> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(SnapshotError::InvalidResult(format!(
            "{name} score {score} is outside [0, 100]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Elevated).unwrap(), "\"elevated\"");
        assert_eq!("HIGH".parse::<Status>().unwrap(), Status::High);
        assert!("extreme".parse::<Status>().is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let ok = CategoryResult::new(55.0, Status::Normal)
            .with_metric("vix", MetricResult::new(0.0, Status::Low))
            .with_metric("breadth", MetricResult::new(100.0, Status::High));
        assert!(ok.validate().is_ok());

        let out_of_range = CategoryResult::new(101.0, Status::High);
        assert!(matches!(out_of_range.validate(), Err(SnapshotError::InvalidResult(_))));

        let nan_metric = CategoryResult::new(50.0, Status::Normal)
            .with_metric("vix", MetricResult::new(f64::NAN, Status::Normal));
        assert!(nan_metric.validate().is_err());
    }

    #[test]
    fn test_detail_omitted_when_absent() {
        let json = serde_json::to_string(&MetricResult::new(40.0, Status::Normal)).unwrap();
        assert_eq!(json, r#"{"score":40.0,"status":"normal"}"#);
    }
}
