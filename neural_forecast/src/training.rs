//! Mini-batch training loop

use crate::dataset::Dataset;
use crate::models::time_net::TimeNet;
use crate::nn::{AdamConfig, OneCycleSchedule};
use forecast_math::loss::Loss;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

/// Resolved training schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub loss: Loss,
    pub seed: u64,
    pub verbose: bool,
}

/// Loss and accuracy of one pass over a dataset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpochStats {
    /// Mean training loss per target, normalized scale
    pub loss: f64,
    /// Regularization loss at the end of the pass
    pub reg_loss: f64,
    /// Mean absolute error in original units
    pub mae: f64,
    /// Root mean squared error in original units
    pub rmse: f64,
}

#[derive(Debug)]
pub struct Trainer {
    config: TrainerConfig,
    schedule: OneCycleSchedule,
    adam: AdamConfig,
    step: usize,
    rng: StdRng,
}

impl Trainer {
    pub fn new(config: TrainerConfig, n_samples: usize) -> Self {
        let batches_per_epoch = (n_samples + config.batch_size - 1) / config.batch_size;
        let total_steps = config.epochs * batches_per_epoch.max(1);
        Self {
            schedule: OneCycleSchedule::new(config.learning_rate, total_steps),
            adam: AdamConfig::default(),
            step: 0,
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Weight of the regularization at `epoch`: off for the first half of
    /// training, then ramped linearly to one
    pub fn regularization_factor(&self, epoch: usize) -> f64 {
        let progress = (epoch + 1) as f64 / self.config.epochs as f64;
        ((progress - 0.5) / 0.5).clamp(0.0, 1.0)
    }

    /// One pass of shuffled mini-batches; `y_scale` converts errors back to
    /// original units
    pub fn run_epoch(
        &mut self,
        net: &mut TimeNet,
        data: &Dataset,
        epoch: usize,
        y_scale: f64,
    ) -> EpochStats {
        let reg_factor = self.regularization_factor(epoch);
        let mut order: Vec<usize> = (0..data.samples.len()).collect();
        order.shuffle(&mut self.rng);

        let mut totals = ErrorTotals::default();
        for batch in order.chunks(self.config.batch_size) {
            net.zero_grad();
            let n_targets: usize = batch
                .iter()
                .map(|&i| data.samples[i].targets.iter().flatten().count())
                .sum();
            if n_targets == 0 {
                continue;
            }

            for &i in batch {
                let sample = &data.samples[i];
                let out = net.forward(sample, data);
                let grad: Vec<f64> = out
                    .yhat
                    .iter()
                    .zip(&sample.targets)
                    .map(|(pred, target)| match target {
                        Some(y) => {
                            let error = pred - y;
                            totals.add(self.config.loss.value(error), error);
                            self.config.loss.gradient(error) / n_targets as f64
                        }
                        None => 0.0,
                    })
                    .collect();
                net.backward(data, &out, &grad);
            }
            net.regularize(reg_factor);

            self.step += 1;
            let lr = self.schedule.lr(self.step - 1);
            let step = self.step as i32;
            for p in net.params_mut() {
                p.adam_step(lr, &self.adam, step);
            }
        }

        let stats = totals.finish(net.regularization() * reg_factor, y_scale);
        if self.config.verbose {
            info!(
                epoch = epoch + 1,
                loss = stats.loss,
                reg_loss = stats.reg_loss,
                mae = stats.mae,
                "epoch finished"
            );
        } else {
            debug!(
                epoch = epoch + 1,
                loss = stats.loss,
                reg_loss = stats.reg_loss,
                mae = stats.mae,
                "epoch finished"
            );
        }
        stats
    }

    /// Loss and accuracy of `net` on `data` without updating it
    pub fn evaluate(net: &TimeNet, data: &Dataset, loss: Loss, y_scale: f64) -> EpochStats {
        let mut totals = ErrorTotals::default();
        for sample in &data.samples {
            let out = net.forward(sample, data);
            for (pred, target) in out.yhat.iter().zip(&sample.targets) {
                if let Some(y) = target {
                    let error = pred - y;
                    totals.add(loss.value(error), error);
                }
            }
        }
        totals.finish(0.0, y_scale)
    }
}

#[derive(Debug, Default)]
struct ErrorTotals {
    loss: f64,
    abs: f64,
    squared: f64,
    count: usize,
}

impl ErrorTotals {
    fn add(&mut self, loss: f64, error: f64) {
        self.loss += loss;
        self.abs += error.abs();
        self.squared += error * error;
        self.count += 1;
    }

    fn finish(&self, reg_loss: f64, y_scale: f64) -> EpochStats {
        if self.count == 0 {
            return EpochStats {
                reg_loss,
                ..Default::default()
            };
        }
        let n = self.count as f64;
        EpochStats {
            loss: self.loss / n,
            reg_loss,
            mae: self.abs / n * y_scale,
            rmse: (self.squared / n).sqrt() * y_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeasonalityMode;
    use crate::dataset::WindowSpec;
    use crate::features::{BlockSource, FeatureLayout};
    use crate::models::time_net::TimeNetSpec;
    use crate::models::trend::PiecewiseLinearTrend;
    use forecast_math::fourier::fourier_row;

    fn seasonal_dataset() -> (Dataset, FeatureLayout) {
        let n = 120;
        let mut layout = FeatureLayout::new();
        layout
            .push(
                "weekly",
                BlockSource::Seasonality {
                    period: 7.0,
                    fourier_order: 2,
                },
                SeasonalityMode::Additive,
                0.0,
            )
            .unwrap();
        let t: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let features: Vec<Vec<f64>> = (0..n).map(|i| fourier_row(i as f64, 7.0, 2)).collect();
        let y: Vec<Option<f64>> = (0..n)
            .map(|i| Some(0.5 * t[i] + 0.3 * features[i][0]))
            .collect();
        let spec = WindowSpec {
            n_lags: 0,
            n_forecasts: 1,
            require_targets: true,
        };
        (Dataset::tabularize(t, features, &y, &[], spec).unwrap(), layout)
    }

    #[test]
    fn test_training_reduces_loss() {
        let (data, layout) = seasonal_dataset();
        let mut rng = StdRng::seed_from_u64(0);
        let spec = TimeNetSpec {
            n_forecasts: 1,
            n_lags: 0,
            num_hidden_layers: 0,
            d_hidden: 1,
            ar_regularization: None,
            trend_smoothness: 0.0,
            trend_threshold: 0.0,
        };
        let mut net = TimeNet::new(
            &spec,
            Some(PiecewiseLinearTrend::evenly_spaced(2, 0.8)),
            layout,
            Vec::new(),
            &mut rng,
        )
        .unwrap();
        let config = TrainerConfig {
            epochs: 100,
            batch_size: 16,
            learning_rate: 0.05,
            loss: Loss::Mse,
            seed: 0,
            verbose: false,
        };

        let before = Trainer::evaluate(&net, &data, config.loss, 1.0);
        let mut trainer = Trainer::new(config, data.len());
        for epoch in 0..config.epochs {
            trainer.run_epoch(&mut net, &data, epoch, 1.0);
        }
        let after = Trainer::evaluate(&net, &data, config.loss, 1.0);
        assert!(after.loss < before.loss * 0.2);
        assert!(after.mae < 0.1);
    }

    #[test]
    fn test_regularization_ramp() {
        let config = TrainerConfig {
            epochs: 10,
            batch_size: 8,
            learning_rate: 0.1,
            loss: Loss::default(),
            seed: 1,
            verbose: false,
        };
        let trainer = Trainer::new(config, 40);
        assert_eq!(trainer.regularization_factor(0), 0.0);
        assert_eq!(trainer.regularization_factor(4), 0.0);
        assert!(trainer.regularization_factor(7) > 0.0);
        assert_eq!(trainer.regularization_factor(9), 1.0);
    }
}
