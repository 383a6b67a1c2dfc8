//! # Neural Forecast
//!
//! A Rust library for interpretable neural time series forecasting.
//!
//! ## Features
//!
//! - Piecewise linear trend with automatic or explicit changepoints
//! - Yearly, weekly and daily Fourier seasonality, additive or multiplicative
//! - Events with day windows and built-in country holidays
//! - Future-known regressors and lagged covariates
//! - Auto-regression over recent values with optional hidden layers
//! - Multi-step forecasts (`yhat1..yhatN`) decomposed into components
//! - Per-epoch training and validation metrics
//! - Plot data for forecasts, components and fitted parameters
//!
//! ## Quick Start
//!
//! ```no_run
//! use neural_forecast::config::{FitOptions, NeuralProphetConfig};
//! use neural_forecast::data::DataLoader;
//! use neural_forecast::models::{NeuralProphet, PredictionFrameOptions};
//!
//! # fn main() -> neural_forecast::Result<()> {
//! // Load data with `ds` and `y` columns
//! let df = DataLoader::from_csv("data.csv")?;
//!
//! // Fit a model with 30 days of auto-regression predicting one week
//! let mut model = NeuralProphet::new(NeuralProphetConfig {
//!     n_lags: 30,
//!     n_forecasts: 7,
//!     ..Default::default()
//! })?;
//! let metrics = model.fit(&df, FitOptions::default())?;
//! println!("{}", metrics);
//!
//! // Forecast the next week
//! let future = model.compose_prediction_df(&df, PredictionFrameOptions::new())?;
//! let forecast = model.predict(&future)?;
//! forecast.write_csv("forecast.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod events;
pub mod features;
pub mod forecast;
pub mod holidays;
pub mod metrics;
pub mod models;
pub mod nn;
pub mod plot;
pub mod scaling;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{FitOptions, NeuralProphetConfig};
pub use crate::data::{DataLoader, TimeSeriesData};
pub use crate::error::{ForecastError, Result};
pub use crate::events::{EventConfig, EventTable};
pub use crate::forecast::Forecast;
pub use crate::metrics::MetricsTable;
pub use crate::models::{ForecastModel, NeuralProphet, PredictionFrameOptions};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
