#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/insights/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Alpha Vantage data provider.
//!
//! This crate implements [`MarketDataProvider`] for the
//! [Alpha Vantage](https://www.alphavantage.co/) query API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use insights_alphavantage::AlphaVantageProvider;
//! use insights_core::{MarketDataProvider, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = AlphaVantageProvider::new("your_api_key");
//!
//!     let bars = provider.fetch_daily_bars(&Symbol::new("AAPL")).await?;
//!     let yields = provider.fetch_treasury_yield("10year").await?;
//!
//!     Ok(())
//! }
//! ```

mod parse;

use async_trait::async_trait;
use insights_core::{
    DataError, Granularity, IpoListing, MarketDataProvider, NewsArticle, RawBar, RawPoint, Result,
    Symbol,
};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Base URL for the Alpha Vantage query API.
const AV_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Default spacing between consecutive requests in milliseconds.
const DEFAULT_REQUEST_SPACING_MS: u64 = 1000;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Alpha Vantage data provider.
///
/// Provides access to:
/// - Daily, weekly, monthly and intraday OHLCV series
/// - Treasury yields and economic indicators
/// - News with sentiment scores
/// - The upcoming IPO calendar
///
/// Requests are spaced at least `request_spacing` apart, including requests
/// issued concurrently from several tasks.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    request_spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl fmt::Debug for AlphaVantageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_spacing", &self.request_spacing)
            .finish()
    }
}

impl AlphaVantageProvider {
    /// Create a new provider with the given API key and default settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Create a new provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: AV_BASE_URL.to_string(),
            request_spacing: Duration::from_millis(DEFAULT_REQUEST_SPACING_MS),
            next_slot: Mutex::new(None),
        }
    }

    /// Create a new provider whose HTTP client times out after `timeout`.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Network(e.to_string()))?;
        Ok(Self::with_client(client, api_key))
    }

    /// Create a provider with the default timeout.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn with_default_timeout(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Override the API base URL (e.g. for a proxy).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the minimum spacing between requests.
    #[must_use]
    pub const fn with_request_spacing(mut self, spacing: Duration) -> Self {
        self.request_spacing = spacing;
        self
    }

    /// Build a GET request for `params` with the API key appended.
    fn request(&self, params: &[(&str, &str)]) -> Result<reqwest::Request> {
        self.client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .build()
            .map_err(|e| DataError::InvalidParameter(e.to_string()))
    }

    /// Reserve the next request slot and wait for it.
    async fn throttle(&self) {
        let wait_until = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |slot| slot.max(now));
            *next_slot = Some(slot + self.request_spacing);
            slot
        };

        if wait_until > Instant::now() {
            debug!(
                "Rate limiting: waiting {}ms",
                wait_until.saturating_duration_since(Instant::now()).as_millis()
            );
            sleep_until(wait_until).await;
        }
    }

    /// Make a GET request and return the body text.
    async fn get(&self, params: &[(&str, &str)]) -> Result<String> {
        let request = self.request(params)?;
        self.throttle().await;
        debug!(?params, "Alpha Vantage request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: parse::PROVIDER_NAME.to_string(),
                retry_after: None,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DataError::Network(format!("HTTP {status}: {text}")));
        }

        response
            .text()
            .await
            .map_err(|e| DataError::Network(e.to_string()))
    }

    async fn fetch_series(&self, function: &str, symbol: &Symbol) -> Result<Vec<RawBar>> {
        let body = self
            .get(&[
                ("function", function),
                ("symbol", symbol.as_str()),
                ("outputsize", "compact"),
            ])
            .await?;
        parse::parse_time_series(&body)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        parse::PROVIDER_NAME
    }

    async fn fetch_daily_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        self.fetch_series("TIME_SERIES_DAILY", symbol).await
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
        let body = self
            .get(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol.as_str()),
                ("interval", interval.as_str()),
                ("outputsize", "compact"),
            ])
            .await?;
        parse::parse_time_series(&body)
    }

    async fn fetch_weekly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        self.fetch_series("TIME_SERIES_WEEKLY", symbol).await
    }

    async fn fetch_monthly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        self.fetch_series("TIME_SERIES_MONTHLY", symbol).await
    }

    async fn fetch_treasury_yield(&self, maturity: &str) -> Result<Vec<RawPoint>> {
        let maturity = maturity.trim().to_lowercase();
        let body = self
            .get(&[
                ("function", "TREASURY_YIELD"),
                ("interval", "daily"),
                ("maturity", maturity.as_str()),
            ])
            .await?;
        parse::parse_points(&body)
    }

    async fn fetch_news_sentiment(&self, topic: Option<&str>) -> Result<Vec<NewsArticle>> {
        let topic = topic.map(|t| t.trim().to_lowercase());
        let mut params = vec![("function", "NEWS_SENTIMENT"), ("limit", "50")];
        if let Some(topic) = &topic {
            params.push(("topics", topic.as_str()));
        }
        let body = self.get(&params).await?;
        parse::parse_news(&body)
    }

    async fn fetch_ipo_calendar(&self) -> Result<Vec<IpoListing>> {
        let body = self.get(&[("function", "IPO_CALENDAR")]).await?;
        parse::parse_ipo_calendar(&body)
    }

    async fn fetch_economic_indicator(&self, indicator: &str) -> Result<Vec<RawPoint>> {
        let function = indicator.trim().to_uppercase();
        if function.is_empty() || !function.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DataError::InvalidParameter(format!(
                "Invalid indicator name: {indicator}"
            )));
        }
        let body = self.get(&[("function", function.as_str())]).await?;
        parse::parse_points(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let provider = AlphaVantageProvider::new("test_key");
        let request = provider
            .request(&[("function", "TIME_SERIES_DAILY"), ("symbol", "AAPL")])
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol=AAPL&apikey=test_key"
        );

        let proxied = AlphaVantageProvider::new("k").with_base_url("http://localhost:8080/query");
        let request = proxied.request(&[("function", "IPO_CALENDAR")]).unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:8080/query?function=IPO_CALENDAR&apikey=k"
        );
    }

    #[test]
    fn test_query_values_are_encoded() {
        let provider = AlphaVantageProvider::new("k");
        let request = provider
            .request(&[("function", "TIME_SERIES_DAILY"), ("symbol", "BRK&B=1 X")])
            .unwrap();

        let pairs: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("function".to_string(), "TIME_SERIES_DAILY".to_string()),
                ("symbol".to_string(), "BRK&B=1 X".to_string()),
                ("apikey".to_string(), "k".to_string()),
            ]
        );
    }

    #[test]
    fn test_provider_metadata() {
        let provider = AlphaVantageProvider::new("test_key");
        assert_eq!(provider.name(), "Alpha Vantage");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = AlphaVantageProvider::new("secret_key_12345");
        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_rejects_non_intraday_interval() {
        let provider = AlphaVantageProvider::new("test_key");
        let err = provider
            .fetch_intraday_bars(&Symbol::new("AAPL"), Granularity::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn test_rejects_invalid_indicator_name() {
        let provider = AlphaVantageProvider::new("test_key");
        let err = provider
            .fetch_economic_indicator("cpi&function=evil")
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidParameter(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_requests() {
        let provider =
            AlphaVantageProvider::new("k").with_request_spacing(Duration::from_millis(500));
        let start = Instant::now();
        provider.throttle().await;
        provider.throttle().await;
        provider.throttle().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
