//! Fourier terms for modelling periodic components
//!
//! A seasonality with period `P` and order `N` is represented by the
//! `2 * N` features `sin(2πkt/P), cos(2πkt/P)` for `k = 1..=N`.

use crate::{MathError, Result};
use std::f64::consts::PI;

/// Fourier features for a single instant.
///
/// The output interleaves sine and cosine terms:
/// `[sin(1·x), cos(1·x), sin(2·x), cos(2·x), ...]` with `x = 2πt/period`.
pub fn fourier_row(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * t / period;
        row.push(x.sin());
        row.push(x.cos());
    }
    row
}

/// Fourier features for a sequence of instants measured in days
pub fn fourier_terms(t_days: &[f64], period: f64, order: usize) -> Result<Vec<Vec<f64>>> {
    if !(period > 0.0) || !period.is_finite() {
        return Err(MathError::InvalidInput(format!(
            "Seasonality period must be positive, got {}",
            period
        )));
    }
    if order == 0 {
        return Err(MathError::InvalidInput(
            "Fourier order must be at least 1".to_string(),
        ));
    }

    Ok(t_days
        .iter()
        .map(|&t| fourier_row(t, period, order))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fourier_shape() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let terms = fourier_terms(&t, 7.0, 3).unwrap();

        assert_eq!(terms.len(), 10);
        assert!(terms.iter().all(|row| row.len() == 6));
    }

    #[test]
    fn test_fourier_is_periodic() {
        let a = fourier_row(2.5, 7.0, 4);
        let b = fourier_row(2.5 + 7.0 * 3.0, 7.0, 4);

        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fourier_pairs_on_unit_circle() {
        let row = fourier_row(123.4, 365.25, 6);
        for pair in row.chunks(2) {
            assert_abs_diff_eq!(pair[0].powi(2) + pair[1].powi(2), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fourier_rejects_bad_arguments() {
        assert!(fourier_terms(&[1.0], 0.0, 3).is_err());
        assert!(fourier_terms(&[1.0], 7.0, 0).is_err());
    }
}
