//! Canned provider serving fixed payloads.
//!
//! [`StaticProvider`] answers every call from data configured up front. It can
//! inject per-item failures and latency, and counts calls, which makes it the
//! test double for everything above the provider seam as well as a way to run
//! the pipeline offline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{
    error::{DataError, Result},
    granularity::Granularity,
    keys::{ALL_TOPICS, CacheKeys},
    provider::MarketDataProvider,
    types::{IpoListing, NewsArticle, RawBar, RawPoint, Symbol},
};

/// Provider serving canned payloads keyed by cache key.
///
/// Items are addressed by the same key the data manager would cache them
/// under, e.g. `market:daily:AAPL` or `macro:treasury:10year`.
#[derive(Debug, Default)]
pub struct StaticProvider {
    bars: HashMap<String, Vec<RawBar>>,
    points: HashMap<String, Vec<RawPoint>>,
    news: HashMap<String, Vec<NewsArticle>>,
    ipos: Option<Vec<IpoListing>>,
    failures: HashMap<String, DataError>,
    latency: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticProvider {
    /// Create an empty provider; every call returns [`DataError::NotFound`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bars` for a symbol at a granularity.
    #[must_use]
    pub fn with_bars(mut self, symbol: &str, granularity: Granularity, bars: Vec<RawBar>) -> Self {
        self.bars.insert(CacheKeys::market(granularity, symbol), bars);
        self
    }

    /// Serve a treasury yield series.
    #[must_use]
    pub fn with_treasury(mut self, maturity: &str, points: Vec<RawPoint>) -> Self {
        self.points.insert(CacheKeys::treasury(maturity), points);
        self
    }

    /// Serve an economic indicator series.
    #[must_use]
    pub fn with_indicator(mut self, indicator: &str, points: Vec<RawPoint>) -> Self {
        self.points.insert(CacheKeys::indicator(indicator), points);
        self
    }

    /// Serve a news feed, for a topic or for all topics when `None`.
    #[must_use]
    pub fn with_news(mut self, topic: Option<&str>, articles: Vec<NewsArticle>) -> Self {
        self.news
            .insert(CacheKeys::news_sentiment(topic.unwrap_or(ALL_TOPICS)), articles);
        self
    }

    /// Serve the IPO calendar.
    #[must_use]
    pub fn with_ipo_calendar(mut self, listings: Vec<IpoListing>) -> Self {
        self.ipos = Some(listings);
        self
    }

    /// Fail every request for `key` with `error`.
    #[must_use]
    pub fn with_failure(mut self, key: impl Into<String>, error: DataError) -> Self {
        self.failures.insert(key.into(), error);
        self
    }

    /// Delay every request for `key` by `delay`.
    #[must_use]
    pub fn with_latency(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.latency.insert(key.into(), delay);
        self
    }

    /// Keys of every request served so far, in arrival order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Number of requests served for `key`.
    pub async fn call_count(&self, key: &str) -> usize {
        self.calls.lock().await.iter().filter(|k| *k == key).count()
    }

    /// Highest number of requests observed in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn serve<T: Clone>(&self, key: String, payload: Option<&T>) -> Result<T> {
        self.calls.lock().await.push(key.clone());
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(delay) = self.latency.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failures.get(&key) {
            return Err(error.clone());
        }
        payload.cloned().ok_or(DataError::NotFound(key))
    }
}

/// Tracks concurrent requests; decrements on drop so cancelled calls are counted out.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_daily_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        let key = CacheKeys::market(Granularity::Daily, symbol.as_str());
        let payload = self.bars.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_intraday_bars(
        &self,
        symbol: &Symbol,
        interval: Granularity,
    ) -> Result<Vec<RawBar>> {
        if !interval.is_intraday() {
            return Err(DataError::InvalidParameter(format!(
                "{interval} is not an intraday interval"
            )));
        }
        let key = CacheKeys::market(interval, symbol.as_str());
        let payload = self.bars.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_weekly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        let key = CacheKeys::market(Granularity::Weekly, symbol.as_str());
        let payload = self.bars.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_monthly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        let key = CacheKeys::market(Granularity::Monthly, symbol.as_str());
        let payload = self.bars.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_treasury_yield(&self, maturity: &str) -> Result<Vec<RawPoint>> {
        let key = CacheKeys::treasury(maturity);
        let payload = self.points.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_economic_indicator(&self, indicator: &str) -> Result<Vec<RawPoint>> {
        let key = CacheKeys::indicator(indicator);
        let payload = self.points.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_news_sentiment(&self, topic: Option<&str>) -> Result<Vec<NewsArticle>> {
        let key = CacheKeys::news_sentiment(topic.unwrap_or(ALL_TOPICS));
        let payload = self.news.get(&key);
        self.serve(key, payload).await
    }

    async fn fetch_ipo_calendar(&self) -> Result<Vec<IpoListing>> {
        let payload = self.ipos.as_ref();
        self.serve(CacheKeys::ipo_calendar(), payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, close: &str) -> RawBar {
        RawBar {
            date: date.to_string(),
            open: close.to_string(),
            high: close.to_string(),
            low: close.to_string(),
            close: close.to_string(),
            volume: "100".to_string(),
        }
    }

    #[tokio::test]
    async fn test_serves_configured_bars() {
        let provider =
            StaticProvider::new().with_bars("aapl", Granularity::Daily, vec![raw("2024-01-02", "1")]);
        let bars = provider.fetch_daily_bars(&Symbol::new("AAPL")).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(provider.call_count("market:daily:AAPL").await, 1);
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let provider = StaticProvider::new();
        let err = provider.fetch_treasury_yield("10year").await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let provider = StaticProvider::new()
            .with_bars("NVDA", Granularity::Daily, vec![raw("2024-01-02", "1")])
            .with_failure("market:daily:NVDA", DataError::Network("reset".to_string()));
        let err = provider.fetch_daily_bars(&Symbol::new("NVDA")).await.unwrap_err();
        assert_eq!(err, DataError::Network("reset".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_bars_dispatches_by_granularity() {
        let provider = StaticProvider::new()
            .with_bars("SPY", Granularity::Min5, vec![raw("2024-01-02 09:35:00", "1")])
            .with_bars("SPY", Granularity::Monthly, vec![raw("2024-01-31", "2")]);
        let symbol = Symbol::new("SPY");
        assert_eq!(provider.fetch_bars(&symbol, Granularity::Min5).await.unwrap().len(), 1);
        assert_eq!(
            provider.fetch_bars(&symbol, Granularity::Monthly).await.unwrap()[0].close,
            "2"
        );
        assert!(provider.fetch_bars(&symbol, Granularity::Weekly).await.is_err());
    }
}
