//! Prediction output

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use std::path::Path;

/// Forecast table returned by `predict`
///
/// Holds `ds`, `y` and the columns `yhat{h}`, `residual{h}`, `trend`,
/// `season_*`, `event_*`, `regressor_*`, `ar{h}` and `covar_*_{h}`, all in
/// original units.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    data: TimeSeriesData,
    n_forecasts: usize,
}

impl Forecast {
    pub(crate) fn new(data: TimeSeriesData, n_forecasts: usize) -> Self {
        Self { data, n_forecasts }
    }

    pub fn data(&self) -> &TimeSeriesData {
        &self.data
    }

    pub fn into_data(self) -> TimeSeriesData {
        self.data
    }

    pub fn n_forecasts(&self) -> usize {
        self.n_forecasts
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ds(&self) -> &[NaiveDateTime] {
        self.data.ds()
    }

    pub fn y(&self) -> &[Option<f64>] {
        self.data.y()
    }

    /// Predictions made `step` rows ahead, 1-based
    pub fn yhat(&self, step: usize) -> Result<&[Option<f64>]> {
        self.column(&format!("yhat{}", step))
    }

    pub fn residual(&self, step: usize) -> Result<&[Option<f64>]> {
        self.column(&format!("residual{}", step))
    }

    /// Any forecast column by name
    pub fn column(&self, name: &str) -> Result<&[Option<f64>]> {
        self.data.column(name).ok_or_else(|| {
            ForecastError::ForecastingError(format!("Forecast has no column '{}'", name))
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.has_column(name)
    }

    /// Names of the component columns (everything except targets,
    /// predictions and residuals)
    pub fn component_names(&self) -> Vec<String> {
        self.data
            .column_names()
            .filter(|name| {
                *name == "trend"
                    || ["season_", "event_", "regressor_", "ar", "covar_"]
                        .iter()
                        .any(|prefix| name.starts_with(prefix))
            })
            .map(str::to_string)
            .collect()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        self.data.to_dataframe()
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.data.write_csv(path)
    }
}
