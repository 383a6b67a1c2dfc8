//! User-defined events such as playoffs or promotions

use crate::config::SeasonalityMode;
use crate::error::{ForecastError, Result};
use crate::utils::parse_datetime;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// A single occurrence of a named event
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub event: String,
    pub ds: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    event: String,
    ds: String,
}

/// Table of event occurrences with `event` and `ds` columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    rows: Vec<EventOccurrence>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table for one event from date strings
    pub fn from_dates(event: &str, dates: &[&str]) -> Result<Self> {
        let mut table = Self::new();
        for date in dates {
            table.push(event, parse_datetime(date)?.date());
        }
        Ok(table)
    }

    /// Read a CSV file with `event` and `ds` columns
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut table = Self::new();
        for record in reader.deserialize() {
            let record: EventRecord = record?;
            table.push(&record.event, parse_datetime(&record.ds)?.date());
        }
        Ok(table)
    }

    pub fn push(&mut self, event: &str, ds: NaiveDate) {
        self.rows.push(EventOccurrence {
            event: event.to_string(),
            ds,
        });
    }

    /// Concatenate another table
    pub fn extend(&mut self, other: &EventTable) {
        self.rows.extend(other.rows.iter().cloned());
    }

    pub fn rows(&self) -> &[EventOccurrence] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct event names
    pub fn names(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.event.as_str()).collect()
    }

    /// Dates on which `event` occurs
    pub fn dates_for(&self, event: &str) -> BTreeSet<NaiveDate> {
        self.rows
            .iter()
            .filter(|r| r.event == event)
            .map(|r| r.ds)
            .collect()
    }

    /// 0/1 indicator of `event` for each timestamp
    pub fn indicator(&self, event: &str, ds: &[NaiveDateTime]) -> Vec<Option<f64>> {
        let dates = self.dates_for(event);
        ds.iter()
            .map(|t| Some(if dates.contains(&t.date()) { 1.0 } else { 0.0 }))
            .collect()
    }
}

/// Window and mode of a registered event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Days before the event with their own effect, zero or negative
    pub lower_window: i64,
    /// Days after the event with their own effect, zero or positive
    pub upper_window: i64,
    pub mode: SeasonalityMode,
    pub regularization: Option<f64>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            lower_window: 0,
            upper_window: 0,
            mode: SeasonalityMode::Additive,
            regularization: None,
        }
    }
}

impl EventConfig {
    pub fn with_window(mut self, lower_window: i64, upper_window: i64) -> Self {
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        self
    }

    pub fn with_mode(mut self, mode: SeasonalityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = Some(regularization);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.lower_window > 0 || self.upper_window < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Event window must contain the event day, got [{}, {}]",
                self.lower_window, self.upper_window
            )));
        }
        if matches!(self.regularization, Some(r) if r < 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Event regularization must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Day offsets covered by the window
    pub fn offsets(&self) -> Vec<i64> {
        (self.lower_window..=self.upper_window).collect()
    }
}

/// Feature name of an event at a day offset
pub fn feature_name(event: &str, offset: i64) -> String {
    match offset {
        0 => event.to_string(),
        o if o > 0 => format!("{}_+{}", event, o),
        o => format!("{}_{}", event, o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_feature_names() {
        assert_eq!(feature_name("playoff", 0), "playoff");
        assert_eq!(feature_name("playoff", 1), "playoff_+1");
        assert_eq!(feature_name("playoff", -1), "playoff_-1");
    }

    #[test]
    fn test_indicator() {
        let table = EventTable::from_dates("superbowl", &["2010-02-07", "2014-02-02"]).unwrap();
        let ds = vec![
            parse_datetime("2010-02-06").unwrap(),
            parse_datetime("2010-02-07").unwrap(),
        ];
        assert_eq!(table.indicator("superbowl", &ds), vec![Some(0.0), Some(1.0)]);
        assert_eq!(table.indicator("playoff", &ds), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_window_validation() {
        let config = EventConfig::default().with_window(-1, 1);
        assert!(config.validate().is_ok());
        assert_eq!(config.offsets(), vec![-1, 0, 1]);
        assert!(EventConfig::default().with_window(1, 2).validate().is_err());
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "event,ds").unwrap();
        writeln!(file, "playoff,2008-01-13").unwrap();
        writeln!(file, "superbowl,2010-02-07").unwrap();
        writeln!(file, "playoff,2009-01-03").unwrap();

        let table = EventTable::from_csv(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.names().into_iter().collect::<Vec<_>>(), vec!["playoff", "superbowl"]);
        assert_eq!(table.dates_for("playoff").len(), 2);
    }
}
