//! Per-call aggregation of prefetched data.

use insights_core::{
    IndicatorPoint, IpoListing, NewsArticle, OhlcvBar, Result, Symbol, TreasuryPoint,
    bars_to_frame,
};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The successful payload of one prefetch item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedData {
    /// Bars for a symbol.
    Ohlcv {
        /// Symbol the bars belong to.
        symbol: Symbol,
        /// Bars, ascending by date.
        bars: Vec<OhlcvBar>,
    },
    /// Treasury yields for a maturity.
    Treasury {
        /// Maturity label.
        maturity: String,
        /// Points, ascending by date.
        points: Vec<TreasuryPoint>,
    },
    /// An economic indicator series.
    Indicator {
        /// Indicator name.
        name: String,
        /// Points, ascending by date.
        points: Vec<IndicatorPoint>,
    },
    /// The news feed.
    News(Vec<NewsArticle>),
    /// The IPO calendar.
    IpoCalendar(Vec<IpoListing>),
}

/// Data fetched once for several consumers, plus the items that failed.
///
/// Lookups are case-normalized the same way cache keys are: symbols are
/// uppercased, maturities and indicator names lowercased. An item that was
/// never requested or that failed reads as `None`.
#[derive(Debug, Clone, Default)]
pub struct SharedDataContext {
    ohlcv: HashMap<Symbol, Vec<OhlcvBar>>,
    treasury: HashMap<String, Vec<TreasuryPoint>>,
    indicators: HashMap<String, Vec<IndicatorPoint>>,
    news: Option<Vec<NewsArticle>>,
    ipo_calendar: Option<Vec<IpoListing>>,
    errors: BTreeMap<String, String>,
    recorded: BTreeSet<String>,
}

impl SharedDataContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the outcome of one item.
    ///
    /// A success clears any error previously recorded under `key`.
    pub fn record(&mut self, key: impl Into<String>, outcome: Result<FetchedData>) {
        let key = key.into();
        self.recorded.insert(key.clone());
        match outcome {
            Ok(data) => {
                self.errors.remove(&key);
                self.insert(data);
            }
            Err(e) => {
                self.errors.insert(key, e.to_string());
            }
        }
    }

    fn insert(&mut self, data: FetchedData) {
        match data {
            FetchedData::Ohlcv { symbol, bars } => {
                self.ohlcv.insert(symbol, bars);
            }
            FetchedData::Treasury { maturity, points } => {
                self.treasury.insert(maturity.to_lowercase(), points);
            }
            FetchedData::Indicator { name, points } => {
                self.indicators.insert(name.to_lowercase(), points);
            }
            FetchedData::News(articles) => self.news = Some(articles),
            FetchedData::IpoCalendar(listings) => self.ipo_calendar = Some(listings),
        }
    }

    /// Bars for `symbol`, ascending by date.
    #[must_use]
    pub fn get_ohlcv(&self, symbol: &str) -> Option<&[OhlcvBar]> {
        self.ohlcv.get(&Symbol::new(symbol)).map(Vec::as_slice)
    }

    /// Treasury yields for `maturity`, ascending by date.
    #[must_use]
    pub fn get_treasury(&self, maturity: &str) -> Option<&[TreasuryPoint]> {
        self.treasury
            .get(&maturity.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// Indicator series `name`, ascending by date.
    #[must_use]
    pub fn get_indicator(&self, name: &str) -> Option<&[IndicatorPoint]> {
        self.indicators
            .get(&name.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// News feed, if it was requested and fetched.
    #[must_use]
    pub fn news(&self) -> Option<&[NewsArticle]> {
        self.news.as_deref()
    }

    /// IPO calendar, if it was requested and fetched.
    #[must_use]
    pub fn ipo_calendar(&self) -> Option<&[IpoListing]> {
        self.ipo_calendar.as_deref()
    }

    /// Returns true if any item failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Failed item keys and their error messages, ordered by key.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Error message recorded for an item key.
    #[must_use]
    pub fn error_for(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    /// Returns true if an outcome, success or failure, was recorded for `key`.
    #[must_use]
    pub fn is_recorded(&self, key: &str) -> bool {
        self.recorded.contains(key)
    }

    /// Symbols with bars, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self.ohlcv.keys().collect();
        symbols.sort();
        symbols
    }

    /// Bars for `symbol` as a `DataFrame`.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be built.
    pub fn ohlcv_frame(&self, symbol: &str) -> Result<Option<DataFrame>> {
        self.get_ohlcv(symbol).map(bars_to_frame).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use insights_core::DataError;

    fn bar(day: u32, close: f64) -> OhlcvBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        OhlcvBar::new(date, close, close, close, close, 100.0)
    }

    #[test]
    fn test_lookups_are_case_normalized() {
        let mut ctx = SharedDataContext::new();
        ctx.record(
            "market:daily:AAPL",
            Ok(FetchedData::Ohlcv {
                symbol: Symbol::new("AAPL"),
                bars: vec![bar(2, 185.0)],
            }),
        );
        ctx.record(
            "macro:treasury:10year",
            Ok(FetchedData::Treasury {
                maturity: "10year".to_string(),
                points: vec![],
            }),
        );

        assert_eq!(ctx.get_ohlcv("aapl").map(<[_]>::len), Some(1));
        assert!(ctx.get_treasury("10YEAR").is_some());
        assert!(ctx.get_ohlcv("MSFT").is_none());
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_errors_recorded_by_key() {
        let mut ctx = SharedDataContext::new();
        ctx.record(
            "market:daily:NVDA",
            Err(DataError::Network("connection reset".to_string())),
        );

        assert!(ctx.has_errors());
        assert!(ctx.is_recorded("market:daily:NVDA"));
        assert!(!ctx.is_recorded("market:daily:MSFT"));
        assert!(ctx.get_ohlcv("NVDA").is_none());
        assert!(
            ctx.error_for("market:daily:NVDA")
                .is_some_and(|e| e.contains("connection reset"))
        );
    }

    #[test]
    fn test_success_clears_earlier_error() {
        let mut ctx = SharedDataContext::new();
        ctx.record("sentiment:news:all", Err(DataError::NotFound("x".to_string())));
        ctx.record("sentiment:news:all", Ok(FetchedData::News(vec![])));

        assert!(!ctx.has_errors());
        assert_eq!(ctx.news().map(<[_]>::len), Some(0));
    }

    #[test]
    fn test_symbols_sorted_and_frame() {
        let mut ctx = SharedDataContext::new();
        for symbol in ["MSFT", "AAPL"] {
            ctx.record(
                format!("market:daily:{symbol}"),
                Ok(FetchedData::Ohlcv {
                    symbol: Symbol::new(symbol),
                    bars: vec![bar(2, 1.0), bar(3, 2.0)],
                }),
            );
        }

        let symbols: Vec<&str> = ctx.symbols().iter().map(|s| s.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);

        let frame = ctx.ohlcv_frame("msft").unwrap().unwrap();
        assert_eq!(frame.height(), 2);
        assert!(ctx.ohlcv_frame("TSLA").unwrap().is_none());
    }
}
