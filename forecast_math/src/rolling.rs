//! Rolling window statistics
//!
//! Contains a streaming Simple Moving Average and a batch `rolling_mean`
//! with `min_periods` semantics, used to derive covariates from a series.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) over the last `period` observed values
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<Option<f64>>,
    sum: f64,
    observed: usize,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
            observed: 0,
        })
    }

    /// Push the next slot of the window; `None` marks a missing observation
    pub fn update(&mut self, value: Option<f64>) {
        self.values.push_back(value);
        if let Some(v) = value {
            self.sum += v;
            self.observed += 1;
        }

        if self.values.len() > self.period {
            if let Some(Some(old)) = self.values.pop_front() {
                self.sum -= old;
                self.observed -= 1;
            }
        }
    }

    /// Mean of the full window
    pub fn value(&self) -> Result<f64> {
        if self.observed < self.period {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period, self.observed
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Mean of the observed values in the window, if at least `min_periods` are present
    pub fn value_with_min_periods(&self, min_periods: usize) -> Option<f64> {
        if self.observed == 0 || self.observed < min_periods {
            return None;
        }
        Some(self.sum / self.observed as f64)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
        self.observed = 0;
    }
}

/// Rolling mean over `window` slots, emitting a value once `min_periods`
/// observations are available in the window
pub fn rolling_mean(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
) -> Result<Vec<Option<f64>>> {
    if min_periods > window {
        return Err(MathError::InvalidInput(format!(
            "min_periods ({}) must not exceed window ({})",
            min_periods, window
        )));
    }

    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(values
        .iter()
        .map(|&v| {
            sma.update(v);
            sma.value_with_min_periods(min_periods)
        })
        .collect())
}
