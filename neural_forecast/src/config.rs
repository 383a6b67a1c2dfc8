//! Model configuration
//!
//! [`NeuralProphetConfig`] carries every construction option of the model.
//! It deserializes from JSON with defaults for any missing field, so a
//! config file only needs to name what it changes.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::loss::Loss;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Default Fourier order of the yearly seasonality
pub const YEARLY_FOURIER_ORDER: usize = 6;
/// Default Fourier order of the weekly seasonality
pub const WEEKLY_FOURIER_ORDER: usize = 4;
/// Default Fourier order of the daily seasonality
pub const DAILY_FOURIER_ORDER: usize = 6;

/// How a component combines with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// Added to the trend
    #[default]
    Additive,
    /// Scales the trend
    Multiplicative,
}

impl FromStr for SeasonalityMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "additive" => Ok(SeasonalityMode::Additive),
            "multiplicative" => Ok(SeasonalityMode::Multiplicative),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown seasonality mode '{}', expected 'additive' or 'multiplicative'",
                other
            ))),
        }
    }
}

impl fmt::Display for SeasonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonalityMode::Additive => write!(f, "additive"),
            SeasonalityMode::Multiplicative => write!(f, "multiplicative"),
        }
    }
}

/// Toggle for one of the built-in seasonalities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalitySetting {
    /// Enabled depending on the span and frequency of the training data
    #[default]
    Auto,
    /// Never fitted
    Disabled,
    /// Always fitted with the default Fourier order
    Enabled,
    /// Always fitted with the given Fourier order
    FourierOrder(usize),
}

impl SeasonalitySetting {
    /// Resolve to a Fourier order, or `None` if the seasonality is off
    pub fn resolve(&self, auto_enabled: bool, default_order: usize) -> Option<usize> {
        match *self {
            SeasonalitySetting::Auto if auto_enabled => Some(default_order),
            SeasonalitySetting::Auto | SeasonalitySetting::Disabled => None,
            SeasonalitySetting::Enabled => Some(default_order),
            SeasonalitySetting::FourierOrder(order) => Some(order),
        }
    }
}

impl From<bool> for SeasonalitySetting {
    fn from(enabled: bool) -> Self {
        if enabled {
            SeasonalitySetting::Enabled
        } else {
            SeasonalitySetting::Disabled
        }
    }
}

impl From<usize> for SeasonalitySetting {
    fn from(order: usize) -> Self {
        SeasonalitySetting::FourierOrder(order)
    }
}

/// Trend growth model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Growth {
    /// No trend; the output is centered on zero
    Off,
    /// Piecewise linear trend
    #[default]
    Linear,
}

/// Normalization applied to a series before training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Minmax for binary series, soft for `y`, standardize for other columns
    #[default]
    Auto,
    /// Keep raw values
    Off,
    /// Map min to 0 and max to 1
    Minmax,
    /// Subtract the mean and divide by the standard deviation
    Standardize,
    /// Map min to 0 and the 95th percentile to 1
    Soft,
}

/// Training loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossFunction {
    /// Smooth L1 with delta 1
    #[default]
    Huber,
    /// Squared error
    Mse,
    /// Absolute error
    Mae,
}

impl LossFunction {
    /// The numerical loss behind this setting
    pub fn to_loss(self) -> Loss {
        match self {
            LossFunction::Huber => Loss::Huber { delta: 1.0 },
            LossFunction::Mse => Loss::Mse,
            LossFunction::Mae => Loss::Mae,
        }
    }
}

/// Construction options of the forecasting model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralProphetConfig {
    pub growth: Growth,
    /// Explicit changepoint dates; overrides `n_changepoints`
    pub changepoints: Option<Vec<NaiveDate>>,
    pub n_changepoints: usize,
    /// Share of the history in which changepoints are placed
    pub changepoints_range: f64,
    pub trend_smoothness: f64,
    pub trend_threshold: bool,
    pub yearly_seasonality: SeasonalitySetting,
    pub weekly_seasonality: SeasonalitySetting,
    pub daily_seasonality: SeasonalitySetting,
    pub seasonality_mode: SeasonalityMode,
    pub seasonality_reg: f64,
    pub n_forecasts: usize,
    pub n_lags: usize,
    /// Fraction of AR weights expected to be non-zero, in (0, 1]
    pub ar_sparsity: Option<f64>,
    pub num_hidden_layers: usize,
    /// Hidden width; defaults to `n_lags + n_forecasts`
    pub d_hidden: Option<usize>,
    pub learning_rate: Option<f64>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub loss_func: LossFunction,
    pub normalize_y: NormalizeMode,
    /// Linearly interpolate interior gaps before training
    pub impute_missing: bool,
    pub seed: u64,
    pub verbose: bool,
}

impl Default for NeuralProphetConfig {
    fn default() -> Self {
        Self {
            growth: Growth::Linear,
            changepoints: None,
            n_changepoints: 5,
            changepoints_range: 0.8,
            trend_smoothness: 0.0,
            trend_threshold: false,
            yearly_seasonality: SeasonalitySetting::Auto,
            weekly_seasonality: SeasonalitySetting::Auto,
            daily_seasonality: SeasonalitySetting::Auto,
            seasonality_mode: SeasonalityMode::Additive,
            seasonality_reg: 0.0,
            n_forecasts: 1,
            n_lags: 0,
            ar_sparsity: None,
            num_hidden_layers: 0,
            d_hidden: None,
            learning_rate: None,
            epochs: None,
            batch_size: None,
            loss_func: LossFunction::Huber,
            normalize_y: NormalizeMode::Auto,
            impute_missing: true,
            seed: 0,
            verbose: false,
        }
    }
}

impl NeuralProphetConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize the configuration as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration for inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if self.n_forecasts == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_forecasts must be at least 1".to_string(),
            ));
        }
        if !(self.changepoints_range > 0.0 && self.changepoints_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoints_range must be in (0, 1], got {}",
                self.changepoints_range
            )));
        }
        if self.trend_smoothness < 0.0 || self.seasonality_reg < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Regularization strengths must be non-negative".to_string(),
            ));
        }
        if let Some(sparsity) = self.ar_sparsity {
            if !(sparsity > 0.0 && sparsity <= 1.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "ar_sparsity must be in (0, 1], got {}",
                    sparsity
                )));
            }
        }
        if self.d_hidden == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "d_hidden must be positive".to_string(),
            ));
        }
        if let Some(lr) = self.learning_rate {
            if !(lr > 0.0 && lr.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "learning_rate must be positive, got {}",
                    lr
                )));
            }
        }
        if self.epochs == Some(0) || self.batch_size == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        for (name, setting) in [
            ("yearly", self.yearly_seasonality),
            ("weekly", self.weekly_seasonality),
            ("daily", self.daily_seasonality),
        ] {
            if setting == SeasonalitySetting::FourierOrder(0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "Fourier order of the {} seasonality must be positive",
                    name
                )));
            }
        }
        if self.growth == Growth::Off && self.seasonality_mode == SeasonalityMode::Multiplicative
        {
            return Err(ForecastError::InvalidParameter(
                "Multiplicative seasonality requires a trend".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and apply coercions that depend on several options
    pub fn resolve(mut self) -> Result<Self> {
        self.validate()?;
        if self.n_lags == 0 && self.n_forecasts > 1 {
            warn!(
                n_forecasts = self.n_forecasts,
                "without lags only a single step is forecast; setting n_forecasts to 1"
            );
            self.n_forecasts = 1;
        }
        Ok(self)
    }

    /// Width of the hidden layers of the AR network
    pub fn d_hidden(&self) -> usize {
        self.d_hidden.unwrap_or(self.n_lags + self.n_forecasts)
    }

    /// Strength of the AR sparsity penalty, if enabled
    pub fn ar_regularization(&self) -> Option<f64> {
        self.ar_sparsity.map(|s| 0.01 * (1.0 / s - 1.0))
    }

    /// Rate changes below this magnitude are not penalized
    pub fn trend_threshold_value(&self) -> f64 {
        if !self.trend_threshold {
            return 0.0;
        }
        let n = self.n_changepoints.max(1) as f64;
        3.0 / (3.0 + (1.0 + self.trend_smoothness) * n.sqrt())
    }
}

/// Options of a future regressor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorConfig {
    pub mode: SeasonalityMode,
    pub regularization: Option<f64>,
    pub normalize: NormalizeMode,
}

impl RegressorConfig {
    pub fn with_mode(mut self, mode: SeasonalityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = Some(regularization);
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeMode) -> Self {
        self.normalize = normalize;
        self
    }
}

/// Options of a lagged covariate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariateConfig {
    pub regularization: Option<f64>,
    pub normalize: NormalizeMode,
    /// Use only the most recent value instead of the full lag window
    pub only_last_value: bool,
}

impl CovariateConfig {
    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = Some(regularization);
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeMode) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn only_last_value(mut self) -> Self {
        self.only_last_value = true;
        self
    }
}

/// Options of a single `fit` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Hold out a validation share and evaluate it after every epoch
    pub validate_each_epoch: bool,
    /// Share of samples held out when validating
    pub valid_p: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            validate_each_epoch: false,
            valid_p: 0.2,
        }
    }
}

impl FitOptions {
    pub fn validated(valid_p: f64) -> Self {
        Self {
            validate_each_epoch: true,
            valid_p,
        }
    }
}

/// Number of epochs for a dataset of `n_samples` windows
pub fn auto_epochs(n_samples: usize) -> usize {
    let n = n_samples.max(1) as f64;
    let epochs = 1000.0 * 2f64.powf(2.5 * (100.0 + n).log10()) / n;
    (epochs as usize).clamp(50, 500)
}

/// Mini-batch size for a dataset of `n_samples` windows
pub fn auto_batch_size(n_samples: usize) -> usize {
    let n = n_samples.max(1) as f64;
    let exponent = 2 + n.log10().floor() as i32;
    2usize.pow(exponent.max(0) as u32).clamp(8, 256)
}

/// Default learning rate of the one-cycle schedule peak
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;
