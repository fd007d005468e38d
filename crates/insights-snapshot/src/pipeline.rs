//! The three-phase snapshot pipeline and its read paths.

use chrono::{Days, NaiveDate, Utc};
use insights_core::{CacheKeys, DataError};
use insights_manager::{DataManager, SharedDataContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};

use crate::{
    calculator::CategoryRegistry,
    document::{SnapshotDocument, day_start},
    error::{Result, SnapshotError},
    result::Status,
    store::DocumentStore,
};

/// Lifetime of the `insights:{category}:latest` cache entry.
pub const LATEST_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Default bound on the prefetch phase.
pub const DEFAULT_PREFETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Wall-clock time spent in each phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseTiming {
    /// Phase 1: prefetch.
    pub phase1_prefetch_seconds: f64,
    /// Phase 2: calculate.
    pub phase2_calculate_seconds: f64,
    /// Phase 3: persist.
    pub phase3_persist_seconds: f64,
    /// Whole run.
    pub total_seconds: f64,
}

/// Outcome class of a run that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every requested item was fetched.
    Completed,
    /// The snapshot was saved, but some inputs were missing.
    Degraded,
}

/// Envelope returned by a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRun {
    /// Category that was snapshotted.
    pub category_id: String,
    /// Snapshot day.
    pub date: NaiveDate,
    /// Whether the inputs were complete.
    pub status: RunStatus,
    /// Composite score that was persisted.
    pub composite_score: f64,
    /// Band of the composite score.
    pub composite_status: Status,
    /// Keys of the prefetch items that failed or never finished.
    pub failed_items: Vec<String>,
    /// Per-phase timings.
    pub timing: PhaseTiming,
}

/// Prefetch, calculate and persist category snapshots.
///
/// Only a calculation or persistence failure fails a run. Prefetch problems,
/// whether per-item errors or a timeout of the whole phase, degrade the run
/// and the calculator works with whatever data arrived.
#[derive(Debug, Clone)]
pub struct SnapshotPipeline {
    manager: DataManager,
    registry: Arc<CategoryRegistry>,
    store: Arc<dyn DocumentStore>,
    prefetch_timeout: Duration,
}

impl SnapshotPipeline {
    /// Create a pipeline over a manager, a registry and a store.
    #[must_use]
    pub fn new(
        manager: DataManager,
        registry: Arc<CategoryRegistry>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            manager,
            registry,
            store,
            prefetch_timeout: DEFAULT_PREFETCH_TIMEOUT,
        }
    }

    /// Override the prefetch timeout.
    #[must_use]
    pub const fn with_prefetch_timeout(mut self, prefetch_timeout: Duration) -> Self {
        self.prefetch_timeout = prefetch_timeout;
        self
    }

    /// Registered categories.
    #[must_use]
    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Snapshot `category_id` for today (UTC).
    ///
    /// # Errors
    /// See [`run_for_date`](Self::run_for_date).
    pub async fn run(&self, category_id: &str) -> Result<SnapshotRun> {
        self.run_for_date(category_id, Utc::now().date_naive()).await
    }

    /// Snapshot `category_id` for `date`, replacing any snapshot of that day.
    ///
    /// # Errors
    /// Returns [`SnapshotError::UnknownCategory`] for an unregistered id,
    /// [`SnapshotError::Calculation`] or [`SnapshotError::InvalidResult`] if
    /// the calculator fails, and [`SnapshotError::Persist`] if the document
    /// store rejects the write. Nothing is cached when persistence fails.
    #[instrument(skip(self), fields(prefetch_timeout = ?self.prefetch_timeout))]
    pub async fn run_for_date(&self, category_id: &str, date: NaiveDate) -> Result<SnapshotRun> {
        let calculator = self
            .registry
            .get(category_id)
            .ok_or_else(|| SnapshotError::UnknownCategory(category_id.to_string()))?;
        let category_id = calculator.category_id().trim().to_lowercase();
        let started = Instant::now();

        // Phase 1: prefetch
        let request = calculator.requirements();
        let mut context = SharedDataContext::new();
        let prefetched = timeout(
            self.prefetch_timeout,
            self.manager.prefetch_into(&request, &mut context),
        )
        .await;
        if prefetched.is_err() {
            warn!(
                category = %category_id,
                timeout = ?self.prefetch_timeout,
                "Prefetch phase timed out, continuing with partial data"
            );
            let message = format!("prefetch timed out after {:?}", self.prefetch_timeout);
            for key in request.items().iter().map(|item| item.key()) {
                if !context.is_recorded(&key) {
                    context.record(key, Err(DataError::Other(message.clone())));
                }
            }
        }
        let phase1 = started.elapsed();

        // Phase 2: calculate
        let result = calculator
            .compute(&context, true)
            .await
            .map_err(|source| SnapshotError::Calculation {
                category_id: category_id.clone(),
                source,
            })?;
        result.validate()?;
        let phase2 = started.elapsed();

        // Phase 3: persist
        let document = SnapshotDocument::from_result(&category_id, date, result, Utc::now());
        self.store
            .upsert(&document)
            .await
            .map_err(|source| SnapshotError::Persist {
                category_id: category_id.clone(),
                source,
            })?;
        self.refresh_latest(&document).await;
        let total = started.elapsed();

        let timing = PhaseTiming {
            phase1_prefetch_seconds: phase1.as_secs_f64(),
            phase2_calculate_seconds: (phase2 - phase1).as_secs_f64(),
            phase3_persist_seconds: (total - phase2).as_secs_f64(),
            total_seconds: total.as_secs_f64(),
        };
        let failed_items: Vec<String> = context.errors().keys().cloned().collect();
        let status = if failed_items.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Degraded
        };

        info!(
            category = %category_id,
            %date,
            ?status,
            composite_score = document.composite_score,
            failed = failed_items.len(),
            phase1_prefetch_seconds = timing.phase1_prefetch_seconds,
            phase2_calculate_seconds = timing.phase2_calculate_seconds,
            phase3_persist_seconds = timing.phase3_persist_seconds,
            total_seconds = timing.total_seconds,
            "Snapshot complete"
        );

        Ok(SnapshotRun {
            category_id,
            date,
            status,
            composite_score: document.composite_score,
            composite_status: document.composite_status,
            failed_items,
            timing,
        })
    }

    /// Snapshot every registered category for today, one after another.
    ///
    /// A failing category does not stop the others.
    pub async fn run_all(&self) -> Vec<(String, Result<SnapshotRun>)> {
        let date = Utc::now().date_naive();
        let mut outcomes = Vec::with_capacity(self.registry.len());
        for id in self.registry.ids() {
            let outcome = self.run_for_date(id, date).await;
            if let Err(e) = &outcome {
                warn!(category = id, error = %e, "Snapshot failed");
            }
            outcomes.push((id.to_string(), outcome));
        }
        outcomes
    }

    /// Most recent snapshot of `category_id`.
    ///
    /// Served from the cache when possible; on a miss the store is queried
    /// and the cache refilled.
    ///
    /// # Errors
    /// Returns [`SnapshotError::Query`] if the store cannot be read.
    pub async fn get_latest_snapshot(&self, category_id: &str) -> Result<Option<SnapshotDocument>> {
        let key = CacheKeys::insights_latest(category_id);
        if let Some(document) = self.manager.cache().get::<SnapshotDocument>(&key).await {
            return Ok(Some(document));
        }

        let document = self
            .store
            .find_latest(category_id)
            .await
            .map_err(|source| SnapshotError::Query {
                category_id: category_id.to_string(),
                source,
            })?;
        if let Some(document) = &document {
            self.manager
                .cache()
                .set(&key, document, LATEST_TTL_SECONDS)
                .await;
        }
        Ok(document)
    }

    /// Snapshots of `category_id` from the trailing `days` days, newest first.
    ///
    /// The window includes today, so `days = 1` returns at most today's.
    ///
    /// # Errors
    /// Returns [`SnapshotError::Query`] if the store cannot be read.
    pub async fn get_trend(&self, category_id: &str, days: u32) -> Result<Vec<SnapshotDocument>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let today = Utc::now().date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        let limit = usize::try_from(days).unwrap_or(usize::MAX);

        self.store
            .find_since(category_id, day_start(first_day), Some(limit))
            .await
            .map_err(|source| SnapshotError::Query {
                category_id: category_id.to_string(),
                source,
            })
    }

    /// Point the fast-path cache at the newest stored snapshot of the
    /// category, which is `document` unless an older day was just backfilled.
    async fn refresh_latest(&self, document: &SnapshotDocument) {
        let key = CacheKeys::insights_latest(&document.category_id);
        let cache = self.manager.cache();
        let newer_cached = cache
            .get::<SnapshotDocument>(&key)
            .await
            .is_some_and(|cached| cached.date > document.date);
        if newer_cached {
            debug!(key = %key, "Newer snapshot already cached, leaving it");
            return;
        }

        let newest = match self.store.find_latest(&document.category_id).await {
            Ok(Some(stored)) if stored.date > document.date => {
                debug!(key = %key, stored = %stored.day(), "Newer snapshot stored, caching it");
                stored
            }
            Ok(_) => document.clone(),
            Err(e) => {
                // Unverifiable; let the next read come from the store.
                warn!(
                    key = %key,
                    error = %e,
                    "Could not read latest snapshot, dropping cache entry"
                );
                cache.delete(&key).await;
                return;
            }
        };
        cache.set(&key, &newest, LATEST_TTL_SECONDS).await;
    }
}
