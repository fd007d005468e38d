//! Provider trait for fetching upstream market data.
//!
//! A [`MarketDataProvider`] is the rate-limited, metered source of truth that the
//! data manager shields with its cache. Every call may fail independently.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::{DataError, Result},
    granularity::Granularity,
    types::{IpoListing, NewsArticle, RawBar, RawPoint, Symbol},
};

/// Upstream source of market and macro data.
///
/// Bar and point payloads are returned as raw rows; callers validate and
/// normalize them. Methods with a default implementation are optional
/// capabilities and return [`DataError::NotSupported`] unless overridden.
#[async_trait]
pub trait MarketDataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Alpha Vantage").
    fn name(&self) -> &str;

    /// Fetches daily bars for a symbol.
    async fn fetch_daily_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>>;

    /// Fetches intraday bars for a symbol at the given interval.
    async fn fetch_intraday_bars(
        &self,
        symbol: &Symbol,
        interval: Granularity,
    ) -> Result<Vec<RawBar>>;

    /// Fetches a treasury yield series for a maturity (e.g. `10year`).
    async fn fetch_treasury_yield(&self, maturity: &str) -> Result<Vec<RawPoint>>;

    /// Fetches news with sentiment, optionally restricted to a topic.
    async fn fetch_news_sentiment(&self, topic: Option<&str>) -> Result<Vec<NewsArticle>>;

    /// Fetches the upcoming IPO calendar.
    async fn fetch_ipo_calendar(&self) -> Result<Vec<IpoListing>>;

    /// Fetches weekly bars for a symbol.
    async fn fetch_weekly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        Err(DataError::NotSupported(format!(
            "{} does not serve weekly bars for {symbol}",
            self.name()
        )))
    }

    /// Fetches monthly bars for a symbol.
    async fn fetch_monthly_bars(&self, symbol: &Symbol) -> Result<Vec<RawBar>> {
        Err(DataError::NotSupported(format!(
            "{} does not serve monthly bars for {symbol}",
            self.name()
        )))
    }

    /// Fetches an economic indicator series (e.g. `cpi`, `federal_funds_rate`).
    async fn fetch_economic_indicator(&self, indicator: &str) -> Result<Vec<RawPoint>> {
        Err(DataError::NotSupported(format!(
            "{} does not serve indicator {indicator}",
            self.name()
        )))
    }

    /// Fetches bars at any granularity by dispatching to the matching call.
    async fn fetch_bars(&self, symbol: &Symbol, granularity: Granularity) -> Result<Vec<RawBar>> {
        match granularity {
            Granularity::Daily => self.fetch_daily_bars(symbol).await,
            Granularity::Weekly => self.fetch_weekly_bars(symbol).await,
            Granularity::Monthly => self.fetch_monthly_bars(symbol).await,
            intraday => self.fetch_intraday_bars(symbol, intraday).await,
        }
    }
}
