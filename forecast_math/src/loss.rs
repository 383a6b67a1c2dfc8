//! Point-wise training losses and their derivatives

use serde::{Deserialize, Serialize};

/// Loss applied to the error `prediction - target`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Loss {
    /// Quadratic near zero, linear beyond `delta` (SmoothL1 for `delta = 1`)
    Huber { delta: f64 },
    /// Squared error
    Mse,
    /// Absolute error
    Mae,
}

impl Default for Loss {
    fn default() -> Self {
        Loss::Huber { delta: 1.0 }
    }
}

impl Loss {
    /// Loss value for a single error
    pub fn value(&self, error: f64) -> f64 {
        match *self {
            Loss::Huber { delta } => {
                let abs = error.abs();
                if abs < delta {
                    0.5 * error * error / delta
                } else {
                    abs - 0.5 * delta
                }
            }
            Loss::Mse => error * error,
            Loss::Mae => error.abs(),
        }
    }

    /// Derivative of the loss with respect to the prediction
    pub fn gradient(&self, error: f64) -> f64 {
        match *self {
            Loss::Huber { delta } => {
                if error.abs() < delta {
                    error / delta
                } else {
                    error.signum()
                }
            }
            Loss::Mse => 2.0 * error,
            Loss::Mae => {
                if error == 0.0 {
                    0.0
                } else {
                    error.signum()
                }
            }
        }
    }

    /// Name used in metric tables
    pub fn name(&self) -> &'static str {
        match self {
            Loss::Huber { .. } => "SmoothL1Loss",
            Loss::Mse => "MSELoss",
            Loss::Mae => "L1Loss",
        }
    }
}
