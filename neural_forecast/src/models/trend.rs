//! Piecewise linear trend over normalized time

use crate::nn::Param;
use serde::{Deserialize, Serialize};

/// `k0 * t + m + sum_j delta_j * max(0, t - c_j)`
///
/// The hinge form keeps the trend continuous at every changepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseLinearTrend {
    changepoints: Vec<f64>,
    k0: Param,
    m: Param,
    deltas: Vec<Param>,
}

impl PiecewiseLinearTrend {
    /// Trend with changepoints at the given normalized times
    pub fn new(changepoints: Vec<f64>) -> Self {
        let n = changepoints.len();
        Self {
            changepoints,
            k0: Param::new(0.0),
            m: Param::new(0.0),
            deltas: vec![Param::new(0.0); n],
        }
    }

    /// `n` changepoints evenly spaced over the first `range` of history
    pub fn evenly_spaced(n: usize, range: f64) -> Self {
        let changepoints = (1..=n).map(|j| range * j as f64 / n as f64).collect();
        Self::new(changepoints)
    }

    /// Initialize slope and offset with a least squares line
    pub fn init_from(&mut self, t: &[f64], y: &[f64]) {
        let n = t.len().min(y.len());
        if n < 2 {
            if let Some(first) = y.first() {
                self.m.value = *first;
            }
            return;
        }
        let mean_t = t[..n].iter().sum::<f64>() / n as f64;
        let mean_y = y[..n].iter().sum::<f64>() / n as f64;
        let mut cov = 0.0;
        let mut var = 0.0;
        for (ti, yi) in t[..n].iter().zip(&y[..n]) {
            cov += (ti - mean_t) * (yi - mean_y);
            var += (ti - mean_t) * (ti - mean_t);
        }
        let slope = if var > 0.0 { cov / var } else { 0.0 };
        self.k0.value = slope;
        self.m.value = mean_y - slope * mean_t;
    }

    pub fn value(&self, t: f64) -> f64 {
        let hinge: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(c, d)| d.value * (t - c).max(0.0))
            .sum();
        self.k0.value * t + self.m.value + hinge
    }

    /// Accumulate gradients for an upstream gradient `grad` at time `t`
    pub fn backward(&mut self, t: f64, grad: f64) {
        self.k0.grad += grad * t;
        self.m.grad += grad;
        for (c, d) in self.changepoints.iter().zip(self.deltas.iter_mut()) {
            d.grad += grad * (t - c).max(0.0);
        }
    }

    /// Mean excess magnitude of rate changes above `threshold`
    pub fn regularization(&self, threshold: f64) -> f64 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        self.deltas
            .iter()
            .map(|d| (d.value.abs() - threshold).max(0.0))
            .sum::<f64>()
            / self.deltas.len() as f64
    }

    pub fn add_regularization_grad(&mut self, threshold: f64, scale: f64) {
        let n = self.deltas.len() as f64;
        for d in self.deltas.iter_mut() {
            if d.value.abs() > threshold {
                d.grad += scale * d.value.signum() / n;
            }
        }
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        std::iter::once(&mut self.k0)
            .chain(std::iter::once(&mut self.m))
            .chain(self.deltas.iter_mut())
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    pub fn initial_rate(&self) -> f64 {
        self.k0.value
    }

    pub fn offset(&self) -> f64 {
        self.m.value
    }

    pub fn rate_changes(&self) -> Vec<f64> {
        self.deltas.iter().map(|d| d.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_continuity_at_changepoint() {
        let mut trend = PiecewiseLinearTrend::new(vec![0.5]);
        trend.k0.value = 1.0;
        trend.deltas[0].value = -2.0;
        let left = trend.value(0.5 - 1e-9);
        let right = trend.value(0.5 + 1e-9);
        assert_relative_eq!(left, right, epsilon = 1e-6);
        // slope after the changepoint is k0 + delta
        assert_relative_eq!(trend.value(1.0) - trend.value(0.75), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_evenly_spaced() {
        let trend = PiecewiseLinearTrend::evenly_spaced(4, 0.8);
        assert_eq!(trend.changepoints().len(), 4);
        assert_relative_eq!(trend.changepoints()[3], 0.8);
        assert_relative_eq!(trend.changepoints()[0], 0.2);
    }

    #[test]
    fn test_init_from_line() {
        let t: Vec<f64> = (0..11).map(|i| i as f64 / 10.0).collect();
        let y: Vec<f64> = t.iter().map(|v| 0.5 + 2.0 * v).collect();
        let mut trend = PiecewiseLinearTrend::evenly_spaced(3, 0.8);
        trend.init_from(&t, &y);
        assert_relative_eq!(trend.initial_rate(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(trend.offset(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_and_regularization() {
        let mut trend = PiecewiseLinearTrend::new(vec![0.25]);
        trend.backward(0.75, 2.0);
        assert_relative_eq!(trend.k0.grad, 1.5);
        assert_relative_eq!(trend.m.grad, 2.0);
        assert_relative_eq!(trend.deltas[0].grad, 1.0);

        trend.deltas[0].value = -0.5;
        assert_relative_eq!(trend.regularization(0.1), 0.4);
        trend.add_regularization_grad(0.1, 1.0);
        assert_relative_eq!(trend.deltas[0].grad, 0.0);
    }
}
