//! Metrics for evaluating forecast performance

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::models::ForecastModel;
use polars::prelude::*;
use std::fmt;

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

/// Calculate forecast accuracy metrics
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::ValidationError(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Zero actuals are left out of the percentage error
    let nonzero: Vec<(f64, f64)> = actual
        .iter()
        .zip(errors.iter())
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| (a, e))
        .collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero.iter().map(|(a, e)| e.abs() / a.abs() * 100.0).sum::<f64>() / nonzero.len() as f64
    };

    let smape = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denom
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
    })
}

/// Training and validation metrics of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub reg_loss: f64,
    pub mae: f64,
    pub rmse: f64,
    pub val_loss: Option<f64>,
    pub val_mae: Option<f64>,
    pub val_rmse: Option<f64>,
}

/// Table of metrics, one row per epoch (or a single row for a test set)
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    loss_name: String,
    rows: Vec<EpochMetrics>,
}

impl MetricsTable {
    /// Create an empty table; `loss_name` labels the loss column
    pub fn new(loss_name: &str) -> Self {
        Self {
            loss_name: loss_name.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: EpochMetrics) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[EpochMetrics] {
        &self.rows
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_validation(&self) -> bool {
        self.rows.iter().any(|r| r.val_loss.is_some())
    }

    /// Column names in display order
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            self.loss_name.clone(),
            "MAE".to_string(),
            "RMSE".to_string(),
            "RegLoss".to_string(),
        ];
        if self.has_validation() {
            names.push(format!("val_{}", self.loss_name));
            names.push("val_MAE".to_string());
            names.push("val_RMSE".to_string());
        }
        names
    }

    fn row_values(&self, row: &EpochMetrics) -> Vec<Option<f64>> {
        let mut values = vec![Some(row.loss), Some(row.mae), Some(row.rmse), Some(row.reg_loss)];
        if self.has_validation() {
            values.extend([row.val_loss, row.val_mae, row.val_rmse]);
        }
        values
    }

    /// Convert to a DataFrame with one column per metric
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names = self.column_names();
        let mut columns: Vec<Vec<Option<f64>>> =
            vec![Vec::with_capacity(self.rows.len()); names.len()];
        for row in &self.rows {
            for (column, value) in columns.iter_mut().zip(self.row_values(row)) {
                column.push(value);
            }
        }
        let series: Vec<Series> = names
            .iter()
            .zip(columns)
            .map(|(name, values)| Series::new(name.as_str(), values))
            .collect();
        Ok(DataFrame::new(series)?)
    }
}

impl fmt::Display for MetricsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.column_names();
        let widths: Vec<usize> = names.iter().map(|n| n.len().max(6)).collect();

        write!(f, "{:>5}", "")?;
        for (name, width) in names.iter().zip(&widths) {
            write!(f, " {:>width$}", name, width = width)?;
        }
        writeln!(f)?;

        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{:>5}", i)?;
            for (value, width) in self.row_values(row).into_iter().zip(&widths) {
                match value {
                    Some(v) => write!(f, " {:>width$}", format!("{:6.3}", v), width = width)?,
                    None => write!(f, " {:>width$}", "NaN", width = width)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Fit a model on `train_data` and score its one-step predictions on
/// `test_data`
pub fn evaluate_model<M: ForecastModel>(
    model: &mut M,
    train_data: &TimeSeriesData,
    test_data: &TimeSeriesData,
) -> Result<ForecastAccuracy> {
    model.fit(train_data)?;
    let forecast = model.predict(test_data)?;

    let yhat = forecast.yhat(1)?;
    let (predicted, actual): (Vec<f64>, Vec<f64>) = yhat
        .iter()
        .zip(forecast.data().y())
        .filter_map(|(p, a)| Some(((*p)?, (*a)?)))
        .unzip();

    if predicted.is_empty() {
        return Err(ForecastError::ForecastingError(format!(
            "Model '{}' produced no predictions for observed values",
            model.name()
        )));
    }
    forecast_accuracy(&predicted, &actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forecast_accuracy() {
        let forecast = [1.0, 2.0, 3.0];
        let actual = [1.0, 3.0, 5.0];
        let acc = forecast_accuracy(&forecast, &actual).unwrap();
        assert_relative_eq!(acc.mae, 1.0);
        assert_relative_eq!(acc.mse, 5.0 / 3.0);
        assert_relative_eq!(acc.rmse, (5.0f64 / 3.0).sqrt());
        assert!(forecast_accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_table_display_and_dataframe() {
        let mut table = MetricsTable::new("SmoothL1Loss");
        table.push(EpochMetrics {
            epoch: 1,
            loss: 0.5,
            mae: 1.25,
            rmse: 1.5,
            ..Default::default()
        });
        table.push(EpochMetrics {
            epoch: 2,
            loss: 0.25,
            mae: 1.0,
            rmse: 1.125,
            val_loss: Some(0.3),
            val_mae: Some(1.1),
            val_rmse: Some(1.2),
            ..Default::default()
        });

        let text = table.to_string();
        assert!(text.contains("SmoothL1Loss"));
        assert!(text.contains("val_MAE"));
        assert!(text.contains(" 0.250"));
        assert!(text.contains("NaN"));

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 7));
    }
}
