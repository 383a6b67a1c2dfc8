//! Time-indexed input features: seasonalities, events, holidays and
//! future regressors
//!
//! Each component owns a contiguous block of the per-row feature vector.
//! The model holds one coefficient per feature and sums each block into
//! its component.

use crate::config::SeasonalityMode;
use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::events::feature_name;
use crate::holidays::{Country, HolidayIndex};
use crate::scaling::DataNormalization;
use crate::utils::days_since_epoch;
use chrono::{Datelike, Duration, NaiveDate};
use forecast_math::fourier::fourier_row;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Where the values of a feature block come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockSource {
    /// Fourier terms of days since the Unix epoch
    Seasonality { period: f64, fourier_order: usize },
    /// Indicator column of a user event, one feature per day offset
    Event { offsets: Vec<i64> },
    /// Computed country holiday, one feature per day offset
    Holiday { country: Country, offsets: Vec<i64> },
    /// Normalized values of a future regressor column
    Regressor,
}

/// A named component with its slice of the feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBlock {
    pub name: String,
    pub source: BlockSource,
    pub mode: SeasonalityMode,
    pub start: usize,
    pub len: usize,
    pub regularization: f64,
}

impl FeatureBlock {
    /// Column name of this component in a forecast
    pub fn component_name(&self) -> String {
        match self.source {
            BlockSource::Seasonality { .. } => format!("season_{}", self.name),
            BlockSource::Event { .. } | BlockSource::Holiday { .. } => {
                format!("event_{}", self.name)
            }
            BlockSource::Regressor => format!("regressor_{}", self.name),
        }
    }

    /// Names of the individual features
    pub fn feature_names(&self) -> Vec<String> {
        match &self.source {
            BlockSource::Seasonality { fourier_order, .. } => (1..=*fourier_order)
                .flat_map(|k| [format!("sin{}", k), format!("cos{}", k)])
                .collect(),
            BlockSource::Event { offsets } | BlockSource::Holiday { offsets, .. } => offsets
                .iter()
                .map(|&o| feature_name(&self.name, o))
                .collect(),
            BlockSource::Regressor => vec![self.name.clone()],
        }
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Ordered set of feature blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    blocks: Vec<FeatureBlock>,
    width: usize,
}

impl FeatureLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block; its width follows from the source
    pub fn push(
        &mut self,
        name: &str,
        source: BlockSource,
        mode: SeasonalityMode,
        regularization: f64,
    ) -> Result<()> {
        if self.blocks.iter().any(|b| b.name == name) {
            return Err(ForecastError::ValidationError(format!(
                "Component '{}' is defined twice",
                name
            )));
        }
        let len = match &source {
            BlockSource::Seasonality { fourier_order, .. } => 2 * fourier_order,
            BlockSource::Event { offsets } | BlockSource::Holiday { offsets, .. } => offsets.len(),
            BlockSource::Regressor => 1,
        };
        if len == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Component '{}' has no features",
                name
            )));
        }
        self.blocks.push(FeatureBlock {
            name: name.to_string(),
            source,
            mode,
            start: self.width,
            len,
            regularization,
        });
        self.width += len;
        Ok(())
    }

    pub fn blocks(&self) -> &[FeatureBlock] {
        &self.blocks
    }

    pub fn block(&self, name: &str) -> Option<&FeatureBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Total number of features per row
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Feature vectors for every row of `data`
    pub fn build_rows(
        &self,
        data: &TimeSeriesData,
        normalization: &DataNormalization,
    ) -> Result<Vec<Vec<f64>>> {
        let mut rows = vec![vec![0.0; self.width]; data.len()];
        if rows.is_empty() {
            return Ok(rows);
        }

        let dates: Vec<NaiveDate> = data.ds().iter().map(|t| t.date()).collect();
        let years = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => (first.year() - 1)..=(last.year() + 1),
            _ => return Ok(rows),
        };
        let mut holiday_indexes: HashMap<Country, HolidayIndex> = HashMap::new();

        for block in &self.blocks {
            match &block.source {
                BlockSource::Seasonality {
                    period,
                    fourier_order,
                } => {
                    for (row, t) in rows.iter_mut().zip(data.ds()) {
                        let terms = fourier_row(days_since_epoch(t), *period, *fourier_order);
                        row[block.range()].copy_from_slice(&terms);
                    }
                }
                BlockSource::Event { offsets } => {
                    let column = data.column(&block.name).ok_or_else(|| {
                        ForecastError::DataError(format!(
                            "Event column '{}' is missing; create it with create_df_with_events",
                            block.name
                        ))
                    })?;
                    let active: BTreeMap<NaiveDate, bool> = dates
                        .iter()
                        .zip(column)
                        .map(|(d, v)| (*d, v.map(|x| x > 0.5).unwrap_or(false)))
                        .collect();
                    for (row, date) in rows.iter_mut().zip(&dates) {
                        for (j, &offset) in offsets.iter().enumerate() {
                            let hit = date
                                .checked_sub_signed(Duration::days(offset))
                                .and_then(|d| active.get(&d).copied())
                                .unwrap_or(false);
                            row[block.start + j] = if hit { 1.0 } else { 0.0 };
                        }
                    }
                }
                BlockSource::Holiday { country, offsets } => {
                    let index = holiday_indexes
                        .entry(*country)
                        .or_insert_with(|| HolidayIndex::new(*country, years.clone()));
                    for (row, date) in rows.iter_mut().zip(&dates) {
                        for (j, &offset) in offsets.iter().enumerate() {
                            let hit = date
                                .checked_sub_signed(Duration::days(offset))
                                .map(|d| index.contains(&block.name, &d))
                                .unwrap_or(false);
                            row[block.start + j] = if hit { 1.0 } else { 0.0 };
                        }
                    }
                }
                BlockSource::Regressor => {
                    let column = data.column(&block.name).ok_or_else(|| {
                        ForecastError::DataError(format!(
                            "Regressor column '{}' is missing",
                            block.name
                        ))
                    })?;
                    let scale = normalization.column(&block.name);
                    for (i, (row, value)) in rows.iter_mut().zip(column).enumerate() {
                        let value = value.ok_or_else(|| {
                            ForecastError::DataError(format!(
                                "Regressor '{}' has no value at {}",
                                block.name,
                                data.ds()[i]
                            ))
                        })?;
                        row[block.start] = scale.transform(value);
                    }
                }
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::{ShiftScale, TimeScale};
    use crate::utils::parse_datetime;

    fn daily(start: &str, n: usize) -> TimeSeriesData {
        let first = parse_datetime(start).unwrap();
        let ds = (0..n).map(|i| first + Duration::days(i as i64)).collect();
        TimeSeriesData::new(ds, vec![1.0; n]).unwrap()
    }

    fn normalization(data: &TimeSeriesData) -> DataNormalization {
        DataNormalization {
            time: TimeScale::fit(data.ds()).unwrap(),
            y: ShiftScale::default(),
            columns: BTreeMap::new(),
        }
    }

    #[test]
    fn test_layout_offsets() {
        let mut layout = FeatureLayout::new();
        layout
            .push(
                "weekly",
                BlockSource::Seasonality {
                    period: 7.0,
                    fourier_order: 3,
                },
                SeasonalityMode::Additive,
                0.0,
            )
            .unwrap();
        layout
            .push("B", BlockSource::Regressor, SeasonalityMode::Additive, 0.0)
            .unwrap();
        assert_eq!(layout.width(), 7);
        assert_eq!(layout.block("B").unwrap().start, 6);
        assert_eq!(layout.block("weekly").unwrap().component_name(), "season_weekly");
        assert!(layout
            .push("B", BlockSource::Regressor, SeasonalityMode::Additive, 0.0)
            .is_err());
    }

    #[test]
    fn test_event_window_features() {
        let mut data = daily("2010-02-05", 5);
        let indicator = vec![Some(0.0), Some(0.0), Some(1.0), Some(0.0), Some(0.0)];
        data.set_column("superbowl", indicator).unwrap();

        let mut layout = FeatureLayout::new();
        layout
            .push(
                "superbowl",
                BlockSource::Event {
                    offsets: vec![-1, 0, 1],
                },
                SeasonalityMode::Additive,
                0.0,
            )
            .unwrap();
        let rows = layout.build_rows(&data, &normalization(&data)).unwrap();
        // offset -1 fires the day before the event
        assert_eq!(rows[1], vec![1.0, 0.0, 0.0]);
        assert_eq!(rows[2], vec![0.0, 1.0, 0.0]);
        assert_eq!(rows[3], vec![0.0, 0.0, 1.0]);
        assert_eq!(rows[0], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_holiday_features() {
        let data = daily("2015-12-24", 3);
        let mut layout = FeatureLayout::new();
        layout
            .push(
                "Christmas Day",
                BlockSource::Holiday {
                    country: Country::US,
                    offsets: vec![0],
                },
                SeasonalityMode::Multiplicative,
                0.0,
            )
            .unwrap();
        let rows = layout.build_rows(&data, &normalization(&data)).unwrap();
        assert_eq!(rows, vec![vec![0.0], vec![1.0], vec![0.0]]);
    }

    #[test]
    fn test_regressor_requires_values() {
        let mut data = daily("2020-01-01", 2);
        data.set_column("B", vec![Some(1.0), None]).unwrap();
        let mut layout = FeatureLayout::new();
        layout
            .push("B", BlockSource::Regressor, SeasonalityMode::Additive, 0.0)
            .unwrap();
        assert!(layout.build_rows(&data, &normalization(&data)).is_err());
    }
}
