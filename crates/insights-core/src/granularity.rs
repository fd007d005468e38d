//! Granularity definitions and the caching policy table.
//!
//! This module defines [`Granularity`], the time resolution of a price series.
//! Each granularity carries a fixed policy: whether it is intraday and how
//! long its data may stay in cache. Intraday data is never cached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Time resolution of a price series.
///
/// Variants are declared from finest to coarsest; the derived ordering follows
/// that declaration.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    /// One-minute bars.
    Min1,
    /// Five-minute bars.
    Min5,
    /// Fifteen-minute bars.
    Min15,
    /// Thirty-minute bars.
    Min30,
    /// Sixty-minute bars.
    Min60,
    /// Daily bars.
    #[default]
    Daily,
    /// Weekly bars.
    Weekly,
    /// Monthly bars.
    Monthly,
}

/// (granularity, is_intraday, ttl_seconds)
const POLICY: [(Granularity, bool, i64); 8] = [
    (Granularity::Min1, true, 0),
    (Granularity::Min5, true, 0),
    (Granularity::Min15, true, 0),
    (Granularity::Min30, true, 0),
    (Granularity::Min60, true, 0),
    (Granularity::Daily, false, 3_600),
    (Granularity::Weekly, false, 21_600),
    (Granularity::Monthly, false, 86_400),
];

impl Granularity {
    /// All granularities, finest first.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::Min1,
            Self::Min5,
            Self::Min15,
            Self::Min30,
            Self::Min60,
            Self::Daily,
            Self::Weekly,
            Self::Monthly,
        ]
    }

    const fn policy(self) -> (bool, i64) {
        let (_, intraday, ttl) = POLICY[self as usize];
        (intraday, ttl)
    }

    /// Returns true if this is an intraday granularity (1 through 60 minutes).
    #[must_use]
    pub const fn is_intraday(self) -> bool {
        self.policy().0
    }

    /// Returns how long data at this granularity may be cached.
    ///
    /// Zero means the data is never cached.
    #[must_use]
    pub const fn ttl_seconds(self) -> i64 {
        self.policy().1
    }

    /// Returns true if data at this granularity may be cached at all.
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        self.ttl_seconds() > 0
    }

    /// Canonical lowercase name, also used as the provider interval string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min5 => "5min",
            Self::Min15 => "15min",
            Self::Min30 => "30min",
            Self::Min60 => "60min",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Granularity {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for Granularity {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1min" | "1m" => Ok(Self::Min1),
            "5min" | "5m" => Ok(Self::Min5),
            "15min" | "15m" => Ok(Self::Min15),
            "30min" | "30m" => Ok(Self::Min30),
            "60min" | "60m" | "1h" | "hourly" => Ok(Self::Min60),
            "daily" | "day" | "1d" => Ok(Self::Daily),
            "weekly" | "week" | "1w" => Ok(Self::Weekly),
            "monthly" | "month" | "1mo" => Ok(Self::Monthly),
            other => Err(DataError::InvalidParameter(format!(
                "Unknown granularity: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.as_str().to_string()
    }
}
