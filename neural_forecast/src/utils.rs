//! Utility functions for the neural_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp string as found in a `ds` column
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date.and_time(NaiveTime::default()));
        }
    }
    Err(ForecastError::DataError(format!(
        "Unrecognized date format: '{}'",
        value
    )))
}

/// Format a timestamp, dropping the time part at midnight
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::default() {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// 1970-01-01 00:00:00
pub fn unix_epoch() -> NaiveDateTime {
    NaiveDateTime::new(
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
        NaiveTime::default(),
    )
}

/// Seconds elapsed since 1970-01-01
pub fn seconds_since_epoch(dt: &NaiveDateTime) -> f64 {
    (*dt - unix_epoch()).num_milliseconds() as f64 / 1000.0
}

/// Fractional days elapsed since 1970-01-01
pub fn days_since_epoch(dt: &NaiveDateTime) -> f64 {
    seconds_since_epoch(dt) / 86_400.0
}

/// Infer the sampling frequency as the most common step between timestamps
pub fn infer_frequency(ds: &[NaiveDateTime]) -> Result<Duration> {
    if ds.len() < 2 {
        return Err(ForecastError::DataError(
            "At least two timestamps are needed to infer the data frequency".to_string(),
        ));
    }

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in ds.windows(2) {
        let step = (pair[1] - pair[0]).num_seconds();
        if step <= 0 {
            return Err(ForecastError::DataError(format!(
                "Timestamps must be strictly increasing ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        *counts.entry(step).or_insert(0) += 1;
    }

    let (step, _) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .ok_or_else(|| ForecastError::DataError("No timestamp steps found".to_string()))?;

    Ok(Duration::seconds(step))
}

/// Create future timestamps following `last_timestamp` at the given frequency
pub fn future_timestamps(
    last_timestamp: NaiveDateTime,
    horizon: usize,
    frequency: Duration,
) -> Result<Vec<NaiveDateTime>> {
    if frequency <= Duration::zero() {
        return Err(ForecastError::ValidationError(format!(
            "Frequency must be positive, got {}",
            frequency
        )));
    }

    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;
    for _ in 0..horizon {
        current = current.checked_add_signed(frequency).ok_or_else(|| {
            ForecastError::DataError("Future timestamp out of range".to_string())
        })?;
        timestamps.push(current);
    }

    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        let a = parse_datetime("2016-01-17").unwrap();
        let b = parse_datetime("2016-01-17 00:00:00").unwrap();
        let c = parse_datetime("2016/01/17").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_datetime("17.01.2016").is_err());
    }

    #[test]
    fn test_format_roundtrip_with_time() {
        let dt = parse_datetime("2020-03-01T12:30:00").unwrap();
        assert_eq!(format_datetime(&dt), "2020-03-01 12:30:00");
        let day = parse_datetime("2020-03-01").unwrap();
        assert_eq!(format_datetime(&day), "2020-03-01");
    }

    #[test]
    fn test_days_since_epoch() {
        let dt = parse_datetime("1970-01-11").unwrap();
        assert_eq!(days_since_epoch(&dt), 10.0);
    }

    #[test]
    fn test_infer_frequency_uses_mode() {
        let ds: Vec<_> = ["2020-01-01", "2020-01-02", "2020-01-03", "2020-01-05"]
            .iter()
            .map(|s| parse_datetime(s).unwrap())
            .collect();
        assert_eq!(infer_frequency(&ds).unwrap(), Duration::days(1));
    }

    #[test]
    fn test_infer_frequency_rejects_unsorted() {
        let ds: Vec<_> = ["2020-01-02", "2020-01-01"]
            .iter()
            .map(|s| parse_datetime(s).unwrap())
            .collect();
        assert!(infer_frequency(&ds).is_err());
    }

    #[test]
    fn test_future_timestamps() {
        let last = parse_datetime("2020-12-30").unwrap();
        let future = future_timestamps(last, 3, Duration::days(1)).unwrap();
        assert_eq!(future.len(), 3);
        assert_eq!(format_datetime(&future[2]), "2021-01-02");
    }
}
