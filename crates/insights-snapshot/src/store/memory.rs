use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use insights_core::Result;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tokio::sync::RwLock;
use tracing::debug;

use super::DocumentStore;
use crate::document::{SnapshotDocument, day_start};

/// Document store held in process memory.
///
/// Documents are kept in key order, so per-category range scans are cheap.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<DocumentKey, SnapshotDocument>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of documents across categories.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns true if no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

type DocumentKey = (String, DateTime<Utc>);

fn normalize(category_id: &str) -> String {
    category_id.trim().to_lowercase()
}

/// Keys of `category_id` dated `since` or later.
fn category_range(category_id: &str, since: DateTime<Utc>) -> RangeInclusive<DocumentKey> {
    (category_id.to_string(), since)..=(category_id.to_string(), DateTime::<Utc>::MAX_UTC)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, document: &SnapshotDocument) -> Result<()> {
        let key = (normalize(&document.category_id), document.date);
        debug!(category = %key.0, date = %key.1, "Upserting snapshot");
        self.documents.write().await.insert(key, document.clone());
        Ok(())
    }

    async fn find_one(
        &self,
        category_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SnapshotDocument>> {
        let key = (normalize(category_id), day_start(date));
        Ok(self.documents.read().await.get(&key).cloned())
    }

    async fn find_latest(&self, category_id: &str) -> Result<Option<SnapshotDocument>> {
        let category_id = normalize(category_id);
        let documents = self.documents.read().await;
        Ok(documents
            .range(category_range(&category_id, DateTime::<Utc>::MIN_UTC))
            .next_back()
            .map(|(_, doc)| doc.clone()))
    }

    async fn find_since(
        &self,
        category_id: &str,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<SnapshotDocument>> {
        let category_id = normalize(category_id);
        let documents = self.documents.read().await;
        Ok(documents
            .range(category_range(&category_id, since))
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn count(&self, category_id: &str) -> Result<usize> {
        let category_id = normalize(category_id);
        Ok(self
            .documents
            .read()
            .await
            .keys()
            .filter(|(id, _)| *id == category_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{CategoryResult, Status};

    fn doc(category: &str, day: u32, score: f64) -> SnapshotDocument {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        SnapshotDocument::from_result(
            category,
            date,
            CategoryResult::new(score, Status::Normal),
            day_start(date),
        )
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_day() {
        let store = InMemoryDocumentStore::new();
        store.upsert(&doc("rates", 1, 40.0)).await.unwrap();
        store.upsert(&doc("rates", 1, 45.0)).await.unwrap();

        assert_eq!(store.count("rates").await.unwrap(), 1);
        let found = store
            .find_one("RATES", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.composite_score, 45.0);
    }

    #[tokio::test]
    async fn test_latest_and_since_are_per_category() {
        let store = InMemoryDocumentStore::new();
        for day in 1..=5 {
            store.upsert(&doc("rates", day, f64::from(day))).await.unwrap();
        }
        store.upsert(&doc("sentiment", 9, 90.0)).await.unwrap();

        let latest = store.find_latest("rates").await.unwrap().unwrap();
        assert_eq!(latest.composite_score, 5.0);

        let since = day_start(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        let recent = store.find_since("rates", since, None).await.unwrap();
        let scores: Vec<f64> = recent.iter().map(|d| d.composite_score).collect();
        assert_eq!(scores, vec![5.0, 4.0, 3.0]);

        let limited = store.find_since("rates", since, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        assert!(store.find_latest("missing").await.unwrap().is_none());
        assert_eq!(store.len().await, 6);
    }
}
