//! Response parsing for the Alpha Vantage query API.
//!
//! Alpha Vantage answers most failures with HTTP 200 and an explanatory JSON
//! object, so every body goes through [`check_api_errors`] before it is
//! interpreted.

use chrono::{NaiveDate, NaiveDateTime};
use insights_core::{DataError, IpoListing, NewsArticle, RawBar, RawPoint, Result, Symbol};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub(crate) const PROVIDER_NAME: &str = "Alpha Vantage";

/// Maps in-band error objects to [`DataError`].
pub(crate) fn check_api_errors(value: &Value) -> Result<()> {
    let Some(object) = value.as_object() else {
        return Ok(());
    };

    if let Some(message) = object.get("Error Message").and_then(Value::as_str) {
        return Err(DataError::NotFound(message.to_string()));
    }
    if object.contains_key("Note") {
        return Err(DataError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            retry_after: None,
        });
    }
    if let Some(message) = object.get("Information").and_then(Value::as_str) {
        let lowered = message.to_lowercase();
        if lowered.contains("rate limit") || lowered.contains("requests per") {
            return Err(DataError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                retry_after: None,
            });
        }
        return Err(DataError::NotSupported(message.to_string()));
    }
    Ok(())
}

fn parse_json(body: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| DataError::Parse(format!("{e}: {body}")))?;
    check_api_errors(&value)?;
    Ok(value)
}

#[derive(Debug, Deserialize)]
struct AvBar {
    #[serde(rename = "1. open", default)]
    open: String,
    #[serde(rename = "2. high", default)]
    high: String,
    #[serde(rename = "3. low", default)]
    low: String,
    #[serde(rename = "4. close", default)]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: String,
}

/// Parses any `TIME_SERIES_*` response into raw bars, oldest first.
pub(crate) fn parse_time_series(body: &str) -> Result<Vec<RawBar>> {
    let value = parse_json(body)?;
    let series = value
        .as_object()
        .and_then(|object| {
            object
                .iter()
                .find(|(key, _)| key.contains("Time Series"))
                .map(|(_, series)| series.clone())
        })
        .ok_or_else(|| DataError::Parse("Missing time series in response".to_string()))?;

    let series: BTreeMap<String, AvBar> =
        serde_json::from_value(series).map_err(|e| DataError::Parse(e.to_string()))?;

    Ok(series
        .into_iter()
        .map(|(date, bar)| RawBar {
            date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AvSeries {
    #[serde(default)]
    data: Vec<AvPoint>,
}

#[derive(Debug, Deserialize)]
struct AvPoint {
    #[serde(default)]
    date: String,
    #[serde(default)]
    value: String,
}

/// Parses `TREASURY_YIELD` and economic indicator responses.
pub(crate) fn parse_points(body: &str) -> Result<Vec<RawPoint>> {
    let value = parse_json(body)?;
    let series: AvSeries =
        serde_json::from_value(value).map_err(|e| DataError::Parse(e.to_string()))?;
    Ok(series
        .data
        .into_iter()
        .map(|p| RawPoint {
            date: p.date,
            value: p.value,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AvNewsResponse {
    #[serde(default)]
    feed: Vec<AvNewsItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AvNewsItem {
    title: String,
    url: String,
    source: String,
    summary: String,
    time_published: String,
    overall_sentiment_score: Option<f64>,
    overall_sentiment_label: String,
    ticker_sentiment: Vec<AvTickerSentiment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AvTickerSentiment {
    ticker: String,
}

/// Parses a `NEWS_SENTIMENT` response.
pub(crate) fn parse_news(body: &str) -> Result<Vec<NewsArticle>> {
    let value = parse_json(body)?;
    let response: AvNewsResponse =
        serde_json::from_value(value).map_err(|e| DataError::Parse(e.to_string()))?;

    Ok(response
        .feed
        .into_iter()
        .map(|item| NewsArticle {
            published_at: NaiveDateTime::parse_from_str(&item.time_published, "%Y%m%dT%H%M%S")
                .ok(),
            title: item.title,
            url: item.url,
            source: item.source,
            summary: item.summary,
            sentiment_score: item.overall_sentiment_score.unwrap_or_default(),
            sentiment_label: item.overall_sentiment_label,
            tickers: item
                .ticker_sentiment
                .into_iter()
                .map(|t| Symbol::new(t.ticker))
                .collect(),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct AvIpoRow {
    symbol: String,
    name: String,
    #[serde(rename = "ipoDate")]
    ipo_date: String,
    #[serde(rename = "priceRangeLow", default)]
    price_range_low: String,
    #[serde(rename = "priceRangeHigh", default)]
    price_range_high: String,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    exchange: String,
}

/// Parses the CSV `IPO_CALENDAR` response, dropping rows without a valid date.
pub(crate) fn parse_ipo_calendar(body: &str) -> Result<Vec<IpoListing>> {
    // Errors and throttle notices still come back as JSON.
    if body.trim_start().starts_with('{') {
        parse_json(body)?;
        return Err(DataError::Parse(format!("Unexpected JSON response: {body}")));
    }

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut listings = Vec::new();
    for row in reader.deserialize::<AvIpoRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "Skipping malformed IPO calendar row");
                continue;
            }
        };
        let Ok(ipo_date) = NaiveDate::parse_from_str(row.ipo_date.trim(), "%Y-%m-%d") else {
            warn!(symbol = %row.symbol, date = %row.ipo_date, "Skipping IPO row with invalid date");
            continue;
        };
        listings.push(IpoListing {
            symbol: Symbol::new(row.symbol),
            name: row.name,
            ipo_date,
            price_range_low: parse_price(&row.price_range_low),
            price_range_high: parse_price(&row.price_range_high),
            currency: row.currency,
            exchange: row.exchange,
        });
    }
    Ok(listings)
}

fn parse_price(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|p| p.is_finite() && *p > 0.0)
}
