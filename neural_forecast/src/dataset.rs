//! Windowing of a normalized series into training samples

use crate::error::{ForecastError, Result};
use tracing::debug;

/// One forecast window
///
/// `origin` is the row of the first forecast target; lags are the
/// `n_lags` rows before it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub origin: usize,
    pub lags: Vec<f64>,
    /// Lag windows of each covariate, in registration order
    pub covariate_lags: Vec<Vec<f64>>,
    /// Targets of the `n_forecasts` rows starting at `origin`
    pub targets: Vec<Option<f64>>,
}

impl Sample {
    pub fn has_targets(&self) -> bool {
        self.targets.iter().any(|t| t.is_some())
    }
}

/// Normalized inputs of every row plus the windows over them
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Normalized time of each row
    pub t: Vec<f64>,
    /// Time-indexed features of each row
    pub features: Vec<Vec<f64>>,
    pub samples: Vec<Sample>,
    pub n_forecasts: usize,
}

/// Builder input for [`Dataset::tabularize`]
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    pub n_lags: usize,
    pub n_forecasts: usize,
    /// Drop windows without any observed target
    pub require_targets: bool,
}

impl Dataset {
    /// Slide a window of `n_lags + n_forecasts` rows over the series.
    ///
    /// Windows whose lags contain missing values are skipped.
    pub fn tabularize(
        t: Vec<f64>,
        features: Vec<Vec<f64>>,
        y: &[Option<f64>],
        covariates: &[Vec<Option<f64>>],
        spec: WindowSpec,
    ) -> Result<Self> {
        let len = y.len();
        if t.len() != len || features.len() != len || covariates.iter().any(|c| c.len() != len) {
            return Err(ForecastError::DataError(
                "Inputs of a dataset must have the same number of rows".to_string(),
            ));
        }
        let window = spec.n_lags + spec.n_forecasts;
        if len < window {
            return Err(ForecastError::DataError(format!(
                "At least {} rows are needed for n_lags={} and n_forecasts={}, got {}",
                window, spec.n_lags, spec.n_forecasts, len
            )));
        }

        let mut samples = Vec::with_capacity(sample_count(len, spec.n_lags, spec.n_forecasts));
        let mut skipped = 0usize;
        for origin in spec.n_lags..=(len - spec.n_forecasts) {
            let lag_rows = origin - spec.n_lags..origin;
            let lags: Option<Vec<f64>> = y[lag_rows.clone()].iter().copied().collect();
            let covariate_lags: Option<Vec<Vec<f64>>> = covariates
                .iter()
                .map(|c| c[lag_rows.clone()].iter().copied().collect())
                .collect();
            let (lags, covariate_lags) = match (lags, covariate_lags) {
                (Some(l), Some(c)) => (l, c),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let sample = Sample {
                origin,
                lags,
                covariate_lags,
                targets: y[origin..origin + spec.n_forecasts].to_vec(),
            };
            if spec.require_targets && !sample.has_targets() {
                skipped += 1;
                continue;
            }
            samples.push(sample);
        }

        if skipped > 0 {
            debug!(skipped, kept = samples.len(), "skipped incomplete windows");
        }
        if samples.is_empty() {
            return Err(ForecastError::DataError(
                "No complete samples could be formed from the data".to_string(),
            ));
        }

        Ok(Self {
            t,
            features,
            samples,
            n_forecasts: spec.n_forecasts,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of observed targets over all samples
    pub fn n_targets(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.targets.iter().flatten().count())
            .sum()
    }
}

/// Number of complete windows in a series of `len` rows
pub fn sample_count(len: usize, n_lags: usize, n_forecasts: usize) -> usize {
    (len + 1).saturating_sub(n_lags + n_forecasts)
}
