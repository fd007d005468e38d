//! Prefetch request and the per-item work it expands to.

use insights_core::{ALL_TOPICS, CacheKeys, Granularity, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The data a batch of consumers needs, fetched once and shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchRequest {
    /// Symbols to fetch bars for.
    pub symbols: Vec<String>,
    /// Granularity of the bars.
    pub granularity: Granularity,
    /// Treasury maturities (e.g. `2year`, `10year`).
    pub treasury_maturities: Vec<String>,
    /// Economic indicator datasets (e.g. `cpi`, `federal_funds_rate`).
    pub indicators: Vec<String>,
    /// Whether to fetch the news sentiment feed.
    pub include_news: bool,
    /// Restricts the news feed to a topic.
    pub news_topic: Option<String>,
    /// Whether to fetch the IPO calendar.
    pub include_ipo: bool,
}

impl PrefetchRequest {
    /// An empty request at daily granularity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols.
    #[must_use]
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Set the bar granularity.
    #[must_use]
    pub const fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Add treasury maturities.
    #[must_use]
    pub fn treasury<I, S>(mut self, maturities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.treasury_maturities
            .extend(maturities.into_iter().map(Into::into));
        self
    }

    /// Add economic indicators.
    #[must_use]
    pub fn indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators.extend(indicators.into_iter().map(Into::into));
        self
    }

    /// Include the news feed, optionally for one topic.
    #[must_use]
    pub fn with_news(mut self, topic: Option<&str>) -> Self {
        self.include_news = true;
        self.news_topic = topic.map(str::to_string);
        self
    }

    /// Include the IPO calendar.
    #[must_use]
    pub const fn with_ipo(mut self) -> Self {
        self.include_ipo = true;
        self
    }

    /// Returns true if nothing would be fetched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Expands the request into one item per fetch.
    ///
    /// Identifiers are normalized before deduplication, so `aapl` and `AAPL`
    /// produce a single fetch. Blank identifiers are skipped.
    #[must_use]
    pub fn items(&self) -> Vec<PrefetchItem> {
        let symbols: BTreeSet<Symbol> = self
            .symbols
            .iter()
            .map(Symbol::new)
            .filter(|s| !s.as_str().is_empty())
            .collect();
        let maturities = normalized_set(&self.treasury_maturities);
        let indicators = normalized_set(&self.indicators);

        let mut items: Vec<PrefetchItem> = symbols
            .into_iter()
            .map(|symbol| PrefetchItem::Ohlcv {
                symbol,
                granularity: self.granularity,
            })
            .collect();
        items.extend(maturities.into_iter().map(PrefetchItem::Treasury));
        items.extend(indicators.into_iter().map(PrefetchItem::Indicator));
        if self.include_news {
            items.push(PrefetchItem::News(
                self.news_topic.as_deref().map(|t| t.trim().to_lowercase()),
            ));
        }
        if self.include_ipo {
            items.push(PrefetchItem::IpoCalendar);
        }
        items
    }
}

fn normalized_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// One independent fetch within a prefetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrefetchItem {
    /// Bars for a symbol.
    Ohlcv {
        /// Symbol to fetch.
        symbol: Symbol,
        /// Bar granularity.
        granularity: Granularity,
    },
    /// A treasury yield series, by maturity.
    Treasury(String),
    /// An economic indicator series, by name.
    Indicator(String),
    /// The news feed, optionally for one topic.
    News(Option<String>),
    /// The IPO calendar.
    IpoCalendar,
}

impl PrefetchItem {
    /// Cache key of this item, also used as its error key.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Ohlcv {
                symbol,
                granularity,
            } => CacheKeys::market(granularity, symbol.as_str()),
            Self::Treasury(maturity) => CacheKeys::treasury(maturity),
            Self::Indicator(name) => CacheKeys::indicator(name),
            Self::News(topic) => CacheKeys::news_sentiment(topic.as_deref().unwrap_or(ALL_TOPICS)),
            Self::IpoCalendar => CacheKeys::ipo_calendar(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_deduplicate_case_variants() {
        let request = PrefetchRequest::new()
            .symbols(["aapl", "AAPL", " msft ", ""])
            .treasury(["10YEAR", "10year", "2year"]);
        let keys: Vec<String> = request.items().iter().map(PrefetchItem::key).collect();
        assert_eq!(
            keys,
            vec![
                "market:daily:AAPL",
                "market:daily:MSFT",
                "macro:treasury:10year",
                "macro:treasury:2year",
            ]
        );
    }

    #[test]
    fn test_optional_datasets() {
        let request = PrefetchRequest::new()
            .indicators(["CPI"])
            .with_news(Some("Technology"))
            .with_ipo();
        let keys: Vec<String> = request.items().iter().map(PrefetchItem::key).collect();
        assert_eq!(
            keys,
            vec![
                "macro:indicator:cpi",
                "sentiment:news:technology",
                "macro:ipo:calendar",
            ]
        );
    }

    #[test]
    fn test_untopical_news_key() {
        let request = PrefetchRequest::new().with_news(None);
        assert_eq!(request.items()[0].key(), "sentiment:news:all");
    }

    #[test]
    fn test_empty_request() {
        assert!(PrefetchRequest::new().is_empty());
        assert!(!PrefetchRequest::new().with_ipo().is_empty());
    }

    #[test]
    fn test_granularity_flows_into_keys() {
        let request = PrefetchRequest::new()
            .symbols(["spy"])
            .granularity(Granularity::Weekly);
        assert_eq!(request.items()[0].key(), "market:weekly:SPY");
    }
}
