//! Cache key construction and parsing.
//!
//! Every key has the shape `domain:type:identifier`. Domain and type are always
//! lowercase; symbol identifiers are uppercased and every other identifier is
//! lowercased, so the same logical input always yields the same key.

use std::fmt;

/// Default suffix for the fast-path snapshot entry.
pub const LATEST_SUFFIX: &str = "latest";

/// Topic identifier used when a news request is not restricted to a topic.
pub const ALL_TOPICS: &str = "all";

/// Namespace for cache key constructors.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    /// Key for price bars: `market:{granularity}:{SYMBOL}`.
    #[must_use]
    pub fn market(granularity: impl AsRef<str>, symbol: &str) -> String {
        format!(
            "market:{}:{}",
            normalize_lower(granularity.as_ref()),
            normalize_upper(symbol)
        )
    }

    /// Key for a treasury yield series: `macro:treasury:{maturity}`.
    #[must_use]
    pub fn treasury(maturity: &str) -> String {
        format!("macro:treasury:{}", normalize_lower(maturity))
    }

    /// Key for an economic indicator series: `macro:indicator:{name}`.
    #[must_use]
    pub fn indicator(name: &str) -> String {
        format!("macro:indicator:{}", normalize_lower(name))
    }

    /// Key for a news sentiment feed: `sentiment:news:{topic}`.
    #[must_use]
    pub fn news_sentiment(topic: &str) -> String {
        format!("sentiment:news:{}", normalize_lower(topic))
    }

    /// Key for the IPO calendar.
    #[must_use]
    pub fn ipo_calendar() -> String {
        "macro:ipo:calendar".to_string()
    }

    /// Key for a derived category artifact: `insights:{category}:{suffix}`.
    #[must_use]
    pub fn insights(category: &str, suffix: &str) -> String {
        format!(
            "insights:{}:{}",
            normalize_lower(category),
            normalize_lower(suffix)
        )
    }

    /// Key for the latest snapshot of a category.
    #[must_use]
    pub fn insights_latest(category: &str) -> String {
        Self::insights(category, LATEST_SUFFIX)
    }

    /// Wildcard pattern covering every identifier of a domain and type.
    #[must_use]
    pub fn pattern(domain: &str, kind: &str) -> String {
        format!("{}:{}:*", normalize_lower(domain), normalize_lower(kind))
    }

    /// Splits a key on its first two colons.
    ///
    /// Returns `None` if the key has fewer than three parts.
    #[must_use]
    pub fn parse(key: &str) -> Option<ParsedKey> {
        let mut parts = key.splitn(3, ':');
        let domain = parts.next()?;
        let kind = parts.next()?;
        let identifier = parts.next()?;
        Some(ParsedKey {
            domain: domain.to_string(),
            kind: kind.to_string(),
            identifier: identifier.to_string(),
        })
    }

    /// Tests whether `key` matches `pattern`.
    ///
    /// A trailing `*` matches any suffix; otherwise the match is exact.
    #[must_use]
    pub fn matches_pattern(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

/// The three components of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedKey {
    /// Data domain (e.g. `market`, `macro`).
    pub domain: String,
    /// Data type within the domain (e.g. `daily`, `treasury`).
    pub kind: String,
    /// Item identifier (e.g. `AAPL`, `10year`).
    pub identifier: String,
}

impl fmt::Display for ParsedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.kind, self.identifier)
    }
}

fn normalize_lower(s: &str) -> String {
    s.trim().to_lowercase()
}

fn normalize_upper(s: &str) -> String {
    s.trim().to_uppercase()
}
