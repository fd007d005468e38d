//! Validation of raw provider rows into canonical records.
//!
//! A record that fails to parse is dropped with a warning; the rest of the
//! payload is kept. Output is sorted ascending by date with one record per date.

use chrono::{NaiveDate, NaiveDateTime};
use insights_core::{
    DataError, IndicatorPoint, OhlcvBar, RawBar, RawPoint, Result, TreasuryPoint,
};
use tracing::warn;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Converts raw bars into validated bars, ascending by date.
pub fn normalize_bars(raw: Vec<RawBar>) -> Vec<OhlcvBar> {
    let mut bars: Vec<OhlcvBar> = raw
        .iter()
        .filter_map(|row| match parse_bar(row) {
            Ok(bar) => Some(bar),
            Err(e) => {
                warn!(date = %row.date, error = %e, "Dropping invalid bar");
                None
            }
        })
        .collect();
    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);
    bars
}

/// Converts raw treasury rows into validated points, ascending by date.
pub fn normalize_treasury(raw: Vec<RawPoint>, maturity: &str) -> Vec<TreasuryPoint> {
    let maturity = maturity.trim().to_lowercase();
    let mut points: Vec<TreasuryPoint> = parse_points(&raw, &maturity)
        .map(|(date, value)| TreasuryPoint {
            date,
            value,
            maturity: maturity.clone(),
        })
        .collect();
    points.sort_by_key(|point| point.date);
    points.dedup_by_key(|point| point.date);
    points
}

/// Converts raw indicator rows into validated points, ascending by date.
pub fn normalize_indicator(raw: Vec<RawPoint>, indicator: &str) -> Vec<IndicatorPoint> {
    let indicator = indicator.trim().to_lowercase();
    let mut points: Vec<IndicatorPoint> = parse_points(&raw, &indicator)
        .map(|(date, value)| IndicatorPoint {
            date,
            value,
            indicator: indicator.clone(),
        })
        .collect();
    points.sort_by_key(|point| point.date);
    points.dedup_by_key(|point| point.date);
    points
}

fn parse_points<'a>(
    raw: &'a [RawPoint],
    series: &'a str,
) -> impl Iterator<Item = (NaiveDate, f64)> + 'a {
    raw.iter().filter_map(move |row| {
        let parsed = parse_date(&row.date).and_then(|date| {
            parse_number("value", &row.value).map(|value| (date, value))
        });
        match parsed {
            Ok(point) => Some(point),
            Err(e) => {
                warn!(series, date = %row.date, error = %e, "Dropping invalid point");
                None
            }
        }
    })
}

fn parse_bar(row: &RawBar) -> Result<OhlcvBar> {
    Ok(OhlcvBar::new(
        parse_timestamp(&row.date)?,
        parse_number("open", &row.open)?,
        parse_number("high", &row.high)?,
        parse_number("low", &row.low)?,
        parse_number("close", &row.close)?,
        parse_number("volume", &row.volume)?,
    ))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| DataError::Validation(format!("unparsable timestamp {s:?}")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DataError::Validation(format!("unparsable date {s:?}: {e}")))
}

fn parse_number(field: &str, s: &str) -> Result<f64> {
    match s.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DataError::Validation(format!("{field} is not numeric: {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_bar(date: &str, close: &str) -> RawBar {
        RawBar {
            date: date.to_string(),
            open: "10.0".to_string(),
            high: "11.0".to_string(),
            low: "9.5".to_string(),
            close: close.to_string(),
            volume: "1200".to_string(),
        }
    }

    fn raw_point(date: &str, value: &str) -> RawPoint {
        RawPoint {
            date: date.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_bars_sorted_ascending() {
        let bars = normalize_bars(vec![
            raw_bar("2024-01-04", "10.4"),
            raw_bar("2024-01-02", "10.2"),
            raw_bar("2024-01-03", "10.3"),
        ]);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![10.2, 10.3, 10.4]);
    }

    #[test]
    fn test_invalid_bar_dropped_rest_kept() {
        let bars = normalize_bars(vec![
            raw_bar("2024-01-02", "10.2"),
            raw_bar("2024-01-03", "n/a"),
            raw_bar("not-a-date", "10.5"),
            raw_bar("2024-01-04", "10.4"),
        ]);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 10.4);
    }

    #[test]
    fn test_intraday_timestamps() {
        let bars = normalize_bars(vec![raw_bar("2024-01-02 09:35:00", "10.0")]);
        assert_eq!(bars[0].date.to_string(), "2024-01-02 09:35:00");
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(parse_number("close", "NaN").is_err());
        assert!(parse_number("close", "inf").is_err());
        assert_eq!(parse_number("close", " 4.5 ").unwrap(), 4.5);
    }

    #[test]
    fn test_treasury_drops_missing_markers() {
        let points = normalize_treasury(
            vec![
                raw_point("2024-01-03", "3.91"),
                raw_point("2024-01-01", "."),
                raw_point("2024-01-02", "3.95"),
            ],
            "10YEAR",
        );
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[0].maturity, "10year");
    }

    #[test]
    fn test_duplicate_dates_collapse() {
        let points = normalize_indicator(
            vec![raw_point("2024-01-01", "3.1"), raw_point("2024-01-01", "3.2")],
            "CPI",
        );
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].indicator, "cpi");
    }
}
