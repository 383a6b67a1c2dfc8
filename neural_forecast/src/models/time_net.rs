//! The trainable network behind the forecaster
//!
//! Combines the trend, the linear time-indexed feature blocks, the AR-Net
//! and one network per lagged covariate:
//!
//! `yhat = trend * (1 + multiplicative) + additive + ar + sum(covariates)`

use crate::config::SeasonalityMode;
use crate::dataset::{Dataset, Sample};
use crate::error::Result;
use crate::features::{FeatureBlock, FeatureLayout};
use crate::models::trend::PiecewiseLinearTrend;
use crate::nn::{Mlp, MlpCache, Param};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Network over the lags of one covariate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateNet {
    pub name: String,
    pub only_last_value: bool,
    pub regularization: Option<f64>,
    pub net: Mlp,
}

impl CovariateNet {
    fn input<'a>(&self, lags: &'a [f64]) -> &'a [f64] {
        if self.only_last_value {
            &lags[lags.len().saturating_sub(1)..]
        } else {
            lags
        }
    }
}

/// Shape and regularization settings of a [`TimeNet`]
#[derive(Debug, Clone, PartialEq)]
pub struct TimeNetSpec {
    pub n_forecasts: usize,
    pub n_lags: usize,
    pub num_hidden_layers: usize,
    pub d_hidden: usize,
    pub ar_regularization: Option<f64>,
    pub trend_smoothness: f64,
    pub trend_threshold: f64,
}

/// Per-step intermediate values of a forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct StepBreakdown {
    pub row: usize,
    pub t: f64,
    pub trend: f64,
    pub additive: f64,
    pub multiplicative: f64,
}

/// Output of a forward pass over one sample
#[derive(Debug, Clone)]
pub struct SampleOutput {
    pub yhat: Vec<f64>,
    pub steps: Vec<StepBreakdown>,
    pub ar: Vec<f64>,
    pub covariates: Vec<Vec<f64>>,
    ar_cache: Option<MlpCache>,
    covariate_caches: Vec<MlpCache>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeNet {
    n_forecasts: usize,
    trend: Option<PiecewiseLinearTrend>,
    layout: FeatureLayout,
    feature_params: Vec<Param>,
    ar: Option<Mlp>,
    ar_regularization: Option<f64>,
    covariates: Vec<CovariateNet>,
    trend_smoothness: f64,
    trend_threshold: f64,
}

impl TimeNet {
    pub fn new(
        spec: &TimeNetSpec,
        trend: Option<PiecewiseLinearTrend>,
        layout: FeatureLayout,
        covariates: Vec<(String, bool, Option<f64>)>,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let hidden = vec![spec.d_hidden; spec.num_hidden_layers];
        let mlp_sizes = |input: usize| -> Vec<usize> {
            let mut sizes = vec![input];
            sizes.extend(hidden.iter().copied());
            sizes.push(spec.n_forecasts);
            sizes
        };

        let ar = if spec.n_lags > 0 {
            Some(Mlp::new(&mlp_sizes(spec.n_lags), rng)?)
        } else {
            None
        };
        let covariates = covariates
            .into_iter()
            .map(|(name, only_last_value, regularization)| {
                let input = if only_last_value { 1 } else { spec.n_lags };
                Ok(CovariateNet {
                    name,
                    only_last_value,
                    regularization,
                    net: Mlp::new(&mlp_sizes(input), rng)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            n_forecasts: spec.n_forecasts,
            trend,
            feature_params: vec![Param::new(0.0); layout.width()],
            layout,
            ar,
            ar_regularization: spec.ar_regularization,
            covariates,
            trend_smoothness: spec.trend_smoothness,
            trend_threshold: spec.trend_threshold,
        })
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn trend(&self) -> Option<&PiecewiseLinearTrend> {
        self.trend.as_ref()
    }

    pub fn trend_mut(&mut self) -> Option<&mut PiecewiseLinearTrend> {
        self.trend.as_mut()
    }

    pub fn ar_net(&self) -> Option<&Mlp> {
        self.ar.as_ref()
    }

    pub fn covariate_nets(&self) -> &[CovariateNet] {
        &self.covariates
    }

    pub fn n_forecasts(&self) -> usize {
        self.n_forecasts
    }

    /// Trend value at normalized time `t`
    pub fn trend_at(&self, t: f64) -> f64 {
        self.trend.as_ref().map(|tr| tr.value(t)).unwrap_or(0.0)
    }

    /// Coefficients of one feature block
    pub fn block_params(&self, block: &FeatureBlock) -> Vec<f64> {
        self.feature_params[block.range()]
            .iter()
            .map(|p| p.value)
            .collect()
    }

    /// Contribution of a block for one feature row, before trend scaling
    pub fn block_value(&self, block: &FeatureBlock, features: &[f64]) -> f64 {
        self.feature_params[block.range()]
            .iter()
            .zip(&features[block.range()])
            .map(|(p, x)| p.value * x)
            .sum()
    }

    fn mode_sums(&self, features: &[f64]) -> (f64, f64) {
        let mut additive = 0.0;
        let mut multiplicative = 0.0;
        for block in self.layout.blocks() {
            let value = self.block_value(block, features);
            match block.mode {
                SeasonalityMode::Additive => additive += value,
                SeasonalityMode::Multiplicative => multiplicative += value,
            }
        }
        (additive, multiplicative)
    }

    pub fn forward(&self, sample: &Sample, data: &Dataset) -> SampleOutput {
        let (ar, ar_cache) = match &self.ar {
            Some(net) => {
                let (out, cache) = net.forward(&sample.lags);
                (out, Some(cache))
            }
            None => (vec![0.0; self.n_forecasts], None),
        };

        let mut covariates = Vec::with_capacity(self.covariates.len());
        let mut covariate_caches = Vec::with_capacity(self.covariates.len());
        for (cov, lags) in self.covariates.iter().zip(&sample.covariate_lags) {
            let (out, cache) = cov.net.forward(cov.input(lags));
            covariates.push(out);
            covariate_caches.push(cache);
        }

        let mut yhat = Vec::with_capacity(self.n_forecasts);
        let mut steps = Vec::with_capacity(self.n_forecasts);
        for h in 0..self.n_forecasts {
            let row = sample.origin + h;
            let t = data.t[row];
            let trend = self.trend_at(t);
            let (additive, multiplicative) = self.mode_sums(&data.features[row]);
            let covar: f64 = covariates.iter().map(|c| c[h]).sum();
            yhat.push(trend * (1.0 + multiplicative) + additive + ar[h] + covar);
            steps.push(StepBreakdown {
                row,
                t,
                trend,
                additive,
                multiplicative,
            });
        }

        SampleOutput {
            yhat,
            steps,
            ar,
            covariates,
            ar_cache,
            covariate_caches,
        }
    }

    /// Accumulate gradients given `dL/dyhat` for each forecast step
    pub fn backward(&mut self, data: &Dataset, out: &SampleOutput, grad: &[f64]) {
        for (step, &g) in out.steps.iter().zip(grad) {
            if g == 0.0 {
                continue;
            }
            if let Some(trend) = self.trend.as_mut() {
                trend.backward(step.t, g * (1.0 + step.multiplicative));
            }
            let features = &data.features[step.row];
            for block in self.layout.blocks() {
                let scale = match block.mode {
                    SeasonalityMode::Additive => g,
                    SeasonalityMode::Multiplicative => g * step.trend,
                };
                for i in block.range() {
                    self.feature_params[i].grad += scale * features[i];
                }
            }
        }

        if let (Some(net), Some(cache)) = (self.ar.as_mut(), out.ar_cache.as_ref()) {
            net.backward(cache, grad);
        }
        for (cov, cache) in self.covariates.iter_mut().zip(&out.covariate_caches) {
            cov.net.backward(cache, grad);
        }
    }

    /// Total regularization loss of the current parameters
    pub fn regularization(&self) -> f64 {
        let mut total = 0.0;
        if let Some(trend) = &self.trend {
            if self.trend_smoothness > 0.0 {
                total += self.trend_smoothness * trend.regularization(self.trend_threshold);
            }
        }
        for block in self.layout.blocks() {
            if block.regularization > 0.0 {
                let params = &self.feature_params[block.range()];
                let mean_abs =
                    params.iter().map(|p| p.value.abs()).sum::<f64>() / params.len() as f64;
                total += block.regularization * mean_abs;
            }
        }
        if let (Some(net), Some(lambda)) = (&self.ar, self.ar_regularization) {
            total += lambda * net.sparsity_penalty();
        }
        for cov in &self.covariates {
            if let Some(lambda) = cov.regularization {
                total += lambda * cov.net.sparsity_penalty();
            }
        }
        total
    }

    /// Add `factor` times the regularization gradient
    pub fn regularize(&mut self, factor: f64) {
        if factor == 0.0 {
            return;
        }
        if let Some(trend) = self.trend.as_mut() {
            if self.trend_smoothness > 0.0 {
                trend.add_regularization_grad(self.trend_threshold, factor * self.trend_smoothness);
            }
        }
        for block in self.layout.blocks() {
            if block.regularization > 0.0 {
                let n = block.len as f64;
                for p in &mut self.feature_params[block.range()] {
                    p.grad += factor * block.regularization * p.value.signum() / n;
                }
            }
        }
        if let (Some(net), Some(lambda)) = (self.ar.as_mut(), self.ar_regularization) {
            net.add_sparsity_grad(factor * lambda);
        }
        for cov in self.covariates.iter_mut() {
            if let Some(lambda) = cov.regularization {
                cov.net.add_sparsity_grad(factor * lambda);
            }
        }
    }

    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params: Vec<&mut Param> = Vec::new();
        if let Some(trend) = self.trend.as_mut() {
            params.extend(trend.params_mut());
        }
        params.extend(self.feature_params.iter_mut());
        if let Some(net) = self.ar.as_mut() {
            params.extend(net.params_mut());
        }
        for cov in self.covariates.iter_mut() {
            params.extend(cov.net.params_mut());
        }
        params
    }

    pub fn zero_grad(&mut self) {
        for p in self.params_mut() {
            p.zero_grad();
        }
    }
}
