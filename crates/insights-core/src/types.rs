//! Core data types for market data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`OhlcvBar`] - OHLCV price bar
//! - [`TreasuryPoint`] - Treasury yield observation
//! - [`IndicatorPoint`] - Economic indicator observation
//! - [`NewsArticle`] - News item with sentiment
//! - [`IpoListing`] - Upcoming IPO
//! - [`RawBar`] / [`RawPoint`] - Provider rows before validation

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};

/// A trading symbol/ticker.
///
/// Symbols are automatically uppercased and trimmed on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// OHLCV (Open, High, Low, Close, Volume) bar data.
///
/// Daily and coarser bars carry a midnight timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Start of the bar interval.
    pub date: NaiveDateTime,
    /// Opening price.
    pub open: f64,
    /// Highest price during the period.
    pub high: f64,
    /// Lowest price during the period.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Trading volume.
    pub volume: f64,
}

impl OhlcvBar {
    /// Creates a new OHLCV bar.
    #[must_use]
    pub const fn new(
        date: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// A single treasury yield observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreasuryPoint {
    /// Observation date.
    pub date: NaiveDate,
    /// Yield in percent.
    pub value: f64,
    /// Maturity label (e.g. `10year`).
    pub maturity: String,
}

/// A single economic indicator observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    /// Observation date.
    pub date: NaiveDate,
    /// Observed value, in the indicator's native unit.
    pub value: f64,
    /// Indicator name (e.g. `cpi`).
    pub indicator: String,
}

/// A news article with its sentiment annotation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Headline.
    pub title: String,
    /// Link to the article.
    pub url: String,
    /// Publisher name.
    pub source: String,
    /// Short summary.
    pub summary: String,
    /// Publication time.
    pub published_at: Option<NaiveDateTime>,
    /// Overall sentiment score, negative is bearish.
    pub sentiment_score: f64,
    /// Provider's sentiment label (e.g. `Somewhat-Bullish`).
    pub sentiment_label: String,
    /// Tickers mentioned in the article.
    pub tickers: Vec<Symbol>,
}

/// An upcoming initial public offering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpoListing {
    /// Expected ticker.
    pub symbol: Symbol,
    /// Company name.
    pub name: String,
    /// Expected listing date.
    pub ipo_date: NaiveDate,
    /// Low end of the indicated price range.
    pub price_range_low: Option<f64>,
    /// High end of the indicated price range.
    pub price_range_high: Option<f64>,
    /// Pricing currency.
    pub currency: String,
    /// Listing exchange.
    pub exchange: String,
}

/// An OHLCV row as delivered by a provider, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBar {
    /// Date or date-time string.
    pub date: String,
    /// Opening price.
    pub open: String,
    /// Highest price.
    pub high: String,
    /// Lowest price.
    pub low: String,
    /// Closing price.
    pub close: String,
    /// Trading volume.
    pub volume: String,
}

/// A dated value as delivered by a provider, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Date string (`YYYY-MM-DD`).
    pub date: String,
    /// Value string; providers use `.` for missing observations.
    pub value: String,
}

/// Builds a DataFrame with columns: date, open, high, low, close, volume.
///
/// # Errors
/// Returns [`DataError::Other`] if polars rejects the columns.
pub fn bars_to_frame(bars: &[OhlcvBar]) -> Result<DataFrame> {
    let dates: Vec<i64> = bars
        .iter()
        .map(|b| b.date.and_utc().timestamp_millis())
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let df = DataFrame::new(vec![
        Column::new("date".into(), dates),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::Other(e.to_string()))?;

    df.lazy()
        .with_column(col("date").cast(DataType::Datetime(TimeUnit::Milliseconds, None)))
        .collect()
        .map_err(|e| DataError::Other(e.to_string()))
}
