//! Forecasting models for time series data

use crate::data::TimeSeriesData;
use crate::error::Result;
use crate::forecast::Forecast;
use crate::metrics::MetricsTable;
use std::fmt::Debug;

pub mod neural_prophet;
pub mod time_net;
pub mod trend;

pub use neural_prophet::{NeuralProphet, PredictionFrameOptions};
pub use time_net::TimeNet;
pub use trend::PiecewiseLinearTrend;

/// Forecast model that is fitted once and then queried
pub trait ForecastModel: Debug {
    /// Name of the model
    fn name(&self) -> &str;

    /// Train the model on time series data
    fn fit(&mut self, data: &TimeSeriesData) -> Result<MetricsTable>;

    /// Score the fitted model on held-out data
    fn test(&self, data: &TimeSeriesData) -> Result<MetricsTable>;

    /// Predict every row of `data` that has a complete input window
    fn predict(&self, data: &TimeSeriesData) -> Result<Forecast>;
}
