//! # NeuralOwl
//!
//! `neural_owl` bundles the forecasting workspace: the `forecast_math`
//! building blocks, the `neural_forecast` model and the debug scenarios run
//! by the `neural_debug` binary.
//!
//! ## Example
//!
//! ```no_run
//! use neural_owl::harness::{synthetic_series, Harness, HarnessOptions, Scenario};
//!
//! # fn main() -> neural_owl::neural_forecast::Result<()> {
//! let data = synthetic_series(1000, 42)?;
//! let harness = Harness::new(data, HarnessOptions::default().with_epochs(20));
//! let outcome = harness.run(Scenario::Trend)?;
//! assert!(outcome.forecast.is_some());
//! # Ok(())
//! # }
//! ```

pub mod harness;

pub use forecast_math;
pub use neural_forecast;
