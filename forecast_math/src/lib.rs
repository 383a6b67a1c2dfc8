//! # Forecast Math
//!
//! Numerical building blocks shared by the forecasting crates.
//! This crate provides Fourier terms for seasonality, rolling windows,
//! gap interpolation, loss functions and calendar arithmetic for holidays.

use thiserror::Error;

pub mod calendar;
pub mod fourier;
pub mod interpolate;
pub mod loss;
pub mod rolling;

/// Errors that can occur in forecasting math
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
