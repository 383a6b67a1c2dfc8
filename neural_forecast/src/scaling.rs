//! Normalization of targets, columns and time

use crate::config::NormalizeMode;
use crate::error::{ForecastError, Result};
use crate::utils::seconds_since_epoch;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::BTreeMap;

/// Affine map `(x - shift) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftScale {
    pub shift: f64,
    pub scale: f64,
}

impl Default for ShiftScale {
    fn default() -> Self {
        Self {
            shift: 0.0,
            scale: 1.0,
        }
    }
}

impl ShiftScale {
    /// Fit the normalization of a series; `Auto` picks soft scaling for
    /// targets and standardization for other columns
    pub fn fit(values: &[Option<f64>], mode: NormalizeMode, is_target: bool) -> Result<Self> {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.is_empty() {
            return Err(ForecastError::DataError(
                "Cannot fit normalization on a series without values".to_string(),
            ));
        }

        let mode = match mode {
            NormalizeMode::Auto if is_binary(&observed) => NormalizeMode::Minmax,
            NormalizeMode::Auto if is_target => NormalizeMode::Soft,
            NormalizeMode::Auto => NormalizeMode::Standardize,
            other => other,
        };

        let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
        let (shift, scale) = match mode {
            NormalizeMode::Off | NormalizeMode::Auto => (0.0, 1.0),
            NormalizeMode::Minmax => {
                let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            NormalizeMode::Standardize => {
                let mean = Statistics::mean(observed.iter());
                let std = if observed.len() > 1 {
                    Statistics::std_dev(observed.iter())
                } else {
                    0.0
                };
                (mean, std)
            }
            NormalizeMode::Soft => {
                let mut data = Data::new(observed);
                (min, data.quantile(0.95) - min)
            }
        };

        let scale = if scale.is_finite() && scale.abs() > f64::EPSILON {
            scale
        } else {
            1.0
        };
        Ok(Self { shift, scale })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.shift) / self.scale
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.shift
    }
}

fn is_binary(values: &[f64]) -> bool {
    let mut distinct: Vec<f64> = Vec::with_capacity(2);
    for &v in values {
        if !distinct.contains(&v) {
            if distinct.len() == 2 {
                return false;
            }
            distinct.push(v);
        }
    }
    distinct.len() == 2
}

/// Maps timestamps to `[0, 1]` over the training range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    /// Seconds since the Unix epoch of the first training timestamp
    pub start: f64,
    /// Seconds spanned by the training data
    pub span: f64,
}

impl TimeScale {
    pub fn fit(ds: &[NaiveDateTime]) -> Result<Self> {
        let (first, last) = match (ds.first(), ds.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ForecastError::DataError(
                    "Cannot fit a time scale on empty data".to_string(),
                ))
            }
        };
        let start = seconds_since_epoch(first);
        let span = seconds_since_epoch(last) - start;
        Ok(Self {
            start,
            span: if span > 0.0 { span } else { 1.0 },
        })
    }

    pub fn transform(&self, ds: &NaiveDateTime) -> f64 {
        (seconds_since_epoch(ds) - self.start) / self.span
    }
}

/// Fitted normalization parameters of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNormalization {
    pub time: TimeScale,
    pub y: ShiftScale,
    pub columns: BTreeMap<String, ShiftScale>,
}

impl DataNormalization {
    /// Scale of a column, identity if the column is not normalized
    pub fn column(&self, name: &str) -> ShiftScale {
        self.columns.get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_datetime;
    use approx::assert_relative_eq;

    fn observed(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_minmax() {
        let s = ShiftScale::fit(&observed(&[2.0, 4.0, 6.0]), NormalizeMode::Minmax, true).unwrap();
        assert_relative_eq!(s.transform(2.0), 0.0);
        assert_relative_eq!(s.transform(6.0), 1.0);
        assert_relative_eq!(s.inverse(0.5), 4.0);
    }

    #[test]
    fn test_auto_modes() {
        let binary = ShiftScale::fit(&observed(&[0.0, 1.0, 1.0, 0.0]), NormalizeMode::Auto, false)
            .unwrap();
        assert_eq!(binary, ShiftScale { shift: 0.0, scale: 1.0 });

        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let soft = ShiftScale::fit(&observed(&values), NormalizeMode::Auto, true).unwrap();
        assert_relative_eq!(soft.shift, 0.0);
        assert!(soft.scale > 90.0 && soft.scale < 100.0);

        let standard = ShiftScale::fit(&observed(&values), NormalizeMode::Auto, false).unwrap();
        assert_relative_eq!(standard.shift, 50.0);
    }

    #[test]
    fn test_constant_series_keeps_unit_scale() {
        let s = ShiftScale::fit(&observed(&[3.0, 3.0, 3.0]), NormalizeMode::Standardize, false)
            .unwrap();
        assert_eq!(s.scale, 1.0);
        assert!(ShiftScale::fit(&[None], NormalizeMode::Soft, true).is_err());
    }

    #[test]
    fn test_time_scale() {
        let ds = vec![
            parse_datetime("2020-01-01").unwrap(),
            parse_datetime("2020-01-11").unwrap(),
        ];
        let scale = TimeScale::fit(&ds).unwrap();
        assert_relative_eq!(scale.transform(&ds[0]), 0.0);
        assert_relative_eq!(scale.transform(&ds[1]), 1.0);
        let later = parse_datetime("2020-01-16").unwrap();
        assert_relative_eq!(scale.transform(&later), 1.5);
    }
}
