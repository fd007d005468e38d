//! End-to-end snapshot runs against SQLite storage.

#![cfg(feature = "sqlite")]

use async_trait::async_trait;
use chrono::NaiveDate;
use insights_cache::{CacheStore, SqliteBackend};
use insights_core::{CacheKeys, DataError, Granularity, RawBar, RawPoint, StaticProvider};
use insights_manager::{DataManager, PrefetchRequest, SharedDataContext};
use insights_snapshot::{
    CategoryCalculator, CategoryRegistry, CategoryResult, DocumentStore, MetricResult, RunStatus,
    SnapshotPipeline, SqliteDocumentStore, Status,
};
use std::sync::Arc;

/// Rates category: curve slope from treasuries plus an equity proxy.
#[derive(Debug)]
struct RatesCalculator;

#[async_trait]
impl CategoryCalculator for RatesCalculator {
    fn category_id(&self) -> &str {
        "rates"
    }

    fn requirements(&self) -> PrefetchRequest {
        PrefetchRequest::new()
            .symbols(["TLT", "IEF"])
            .treasury(["2year", "10year"])
    }

    async fn compute(
        &self,
        context: &SharedDataContext,
        _force_refresh: bool,
    ) -> insights_core::Result<CategoryResult> {
        let last = |maturity: &str| {
            context
                .get_treasury(maturity)
                .and_then(<[_]>::last)
                .map(|p| p.value)
        };
        let slope = match (last("2year"), last("10year")) {
            (Some(short), Some(long)) => {
                MetricResult::new((50.0 + (long - short) * 10.0).clamp(0.0, 100.0), Status::Normal)
            }
            _ => MetricResult::new(0.0, Status::Low).with_detail("treasury data unavailable"),
        };
        let duration = match context.get_ohlcv("tlt").and_then(<[_]>::last) {
            Some(bar) => MetricResult::new(bar.close.clamp(0.0, 100.0), Status::Normal),
            None => MetricResult::new(0.0, Status::Low).with_detail("TLT unavailable"),
        };
        let composite = (slope.score + duration.score) / 2.0;
        Ok(CategoryResult::new(composite, Status::Normal)
            .with_metric("curve_slope", slope)
            .with_metric("duration", duration))
    }
}

fn bars(close: &str) -> Vec<RawBar> {
    ["2024-03-01", "2024-03-04"]
        .into_iter()
        .map(|date| RawBar {
            date: date.to_string(),
            open: close.to_string(),
            high: close.to_string(),
            low: close.to_string(),
            close: close.to_string(),
            volume: "250000".to_string(),
        })
        .collect()
}

fn points(values: &[(&str, &str)]) -> Vec<RawPoint> {
    values
        .iter()
        .map(|(date, value)| RawPoint {
            date: (*date).to_string(),
            value: (*value).to_string(),
        })
        .collect()
}

fn provider() -> StaticProvider {
    StaticProvider::new()
        .with_bars("TLT", Granularity::Daily, bars("92.5"))
        .with_bars("IEF", Granularity::Daily, bars("95.0"))
        .with_treasury("2year", points(&[("2024-03-01", "4.60"), ("2024-03-04", "4.55")]))
        .with_treasury(
            "10year",
            points(&[("2024-03-01", "4.20"), ("2024-03-04", "."), ("2024-03-05", "4.25")]),
        )
}

fn setup(
    provider: StaticProvider,
) -> (SnapshotPipeline, Arc<SqliteDocumentStore>, Arc<StaticProvider>) {
    let provider = Arc::new(provider);
    let cache = CacheStore::new(Arc::new(SqliteBackend::in_memory().unwrap()));
    let manager = DataManager::new(provider.clone(), cache).with_max_concurrency(2);
    let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
    let registry = CategoryRegistry::new().with(Arc::new(RatesCalculator));
    let pipeline = SnapshotPipeline::new(manager, Arc::new(registry), store.clone());
    (pipeline, store, provider)
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

#[tokio::test]
async fn test_full_run_persists_and_caches() {
    let (pipeline, store, _provider) = setup(provider());

    let run = pipeline.run_for_date("rates", march(5)).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let stored = store.find_one("rates", march(5)).await.unwrap().unwrap();
    assert_eq!(stored.composite_score, run.composite_score);
    // 10year - 2year = 4.25 - 4.55 = -0.30 -> 50 - 3
    assert!((stored.metrics["curve_slope"].score - 47.0).abs() < 1e-9);
    assert_eq!(stored.metrics["duration"].score, 92.5);

    let latest = pipeline.get_latest_snapshot("RATES").await.unwrap().unwrap();
    assert_eq!(latest, stored);
}

#[tokio::test]
async fn test_second_run_reuses_cached_inputs() {
    let (pipeline, store, provider) = setup(provider());

    pipeline.run_for_date("rates", march(5)).await.unwrap();
    pipeline.run_for_date("rates", march(5)).await.unwrap();

    assert_eq!(store.count("rates").await.unwrap(), 1);
    assert_eq!(provider.call_count(&CacheKeys::market(Granularity::Daily, "TLT")).await, 1);
    assert_eq!(provider.call_count(&CacheKeys::treasury("10year")).await, 1);
}

#[tokio::test]
async fn test_provider_outage_degrades_but_persists() {
    let provider = provider()
        .with_failure("macro:treasury:2year", DataError::RateLimited {
            provider: "static".to_string(),
            retry_after: None,
        })
        .with_failure("market:daily:IEF", DataError::Network("reset".to_string()));
    let (pipeline, store, _provider) = setup(provider);

    let run = pipeline.run_for_date("rates", march(5)).await.unwrap();

    assert_eq!(run.status, RunStatus::Degraded);
    assert_eq!(run.failed_items, vec!["macro:treasury:2year", "market:daily:IEF"]);

    let stored = store.find_one("rates", march(5)).await.unwrap().unwrap();
    assert_eq!(
        stored.metrics["curve_slope"].detail.as_deref(),
        Some("treasury data unavailable")
    );
    assert!(stored.metrics["duration"].detail.is_none());
}

#[tokio::test]
async fn test_trend_reads_back_newest_first() {
    let (pipeline, store, _provider) = setup(provider());
    for day in [1, 4, 5] {
        pipeline.run_for_date("rates", march(day)).await.unwrap();
    }

    let all = store
        .find_since("rates", insights_snapshot::document::day_start(march(1)), None)
        .await
        .unwrap();
    let days: Vec<NaiveDate> = all.iter().map(|d| d.day()).collect();
    assert_eq!(days, vec![march(5), march(4), march(1)]);
}
