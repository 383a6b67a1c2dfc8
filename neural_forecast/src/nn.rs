//! Minimal dense networks with manual backpropagation
//!
//! Only what the forecasting model needs: scalar parameters with Adam
//! state, fully connected layers, ReLU MLPs, a one-cycle learning-rate
//! schedule and the sparsity penalty used on autoregression weights.

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A trainable scalar with its gradient and Adam moments
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Param {
    pub value: f64,
    #[serde(skip)]
    pub grad: f64,
    #[serde(skip)]
    m: f64,
    #[serde(skip)]
    v: f64,
}

impl Param {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad = 0.0;
    }

    /// Apply one bias-corrected Adam update; `step` starts at 1
    pub fn adam_step(&mut self, lr: f64, config: &AdamConfig, step: i32) {
        self.m = config.beta1 * self.m + (1.0 - config.beta1) * self.grad;
        self.v = config.beta2 * self.v + (1.0 - config.beta2) * self.grad * self.grad;
        let m_hat = self.m / (1.0 - config.beta1.powi(step));
        let v_hat = self.v / (1.0 - config.beta2.powi(step));
        self.value -= lr * m_hat / (v_hat.sqrt() + config.eps);
    }
}

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// Fully connected layer `y = W x (+ b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    in_dim: usize,
    out_dim: usize,
    /// Row-major `out_dim x in_dim`
    weights: Vec<Param>,
    bias: Option<Vec<Param>>,
}

impl Linear {
    /// Kaiming-normal initialized layer
    pub fn new(in_dim: usize, out_dim: usize, bias: bool, rng: &mut StdRng) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Layer dimensions must be positive, got {}x{}",
                in_dim, out_dim
            )));
        }
        let std = (2.0 / in_dim as f64).sqrt();
        let normal = Normal::new(0.0, std)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let weights = (0..in_dim * out_dim)
            .map(|_| Param::new(normal.sample(rng)))
            .collect();
        Ok(Self {
            in_dim,
            out_dim,
            weights,
            bias: bias.then(|| vec![Param::new(0.0); out_dim]),
        })
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub fn weight(&self, out: usize, input: usize) -> f64 {
        self.weights[out * self.in_dim + input].value
    }

    pub fn weights(&self) -> &[Param] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [Param] {
        &mut self.weights
    }

    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        (0..self.out_dim)
            .map(|o| {
                let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
                let dot: f64 = row.iter().zip(x).map(|(w, xi)| w.value * xi).sum();
                dot + self.bias.as_ref().map(|b| b[o].value).unwrap_or(0.0)
            })
            .collect()
    }

    /// Accumulate parameter gradients and return the gradient w.r.t. `x`
    pub fn backward(&mut self, x: &[f64], grad_out: &[f64]) -> Vec<f64> {
        let mut grad_in = vec![0.0; self.in_dim];
        for (o, &g) in grad_out.iter().enumerate() {
            if g == 0.0 {
                continue;
            }
            let row = &mut self.weights[o * self.in_dim..(o + 1) * self.in_dim];
            for (i, w) in row.iter_mut().enumerate() {
                w.grad += g * x[i];
                grad_in[i] += g * w.value;
            }
            if let Some(bias) = self.bias.as_mut() {
                bias[o].grad += g;
            }
        }
        grad_in
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.weights
            .iter_mut()
            .chain(self.bias.iter_mut().flat_map(|b| b.iter_mut()))
    }
}

/// Intermediate values of a forward pass, needed for backpropagation
#[derive(Debug, Clone, Default)]
pub struct MlpCache {
    inputs: Vec<Vec<f64>>,
    pre_activations: Vec<Vec<f64>>,
}

/// Multi-layer perceptron with ReLU hidden layers and a linear,
/// bias-free output layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// `sizes` lists the input width, hidden widths and output width
    pub fn new(sizes: &[usize], rng: &mut StdRng) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(ForecastError::InvalidParameter(
                "An MLP needs at least input and output sizes".to_string(),
            ));
        }
        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Linear::new(pair[0], pair[1], i < last, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn forward(&self, x: &[f64]) -> (Vec<f64>, MlpCache) {
        let mut cache = MlpCache::default();
        let mut current = x.to_vec();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = layer.forward(&current);
            cache.inputs.push(current);
            if i < last {
                current = out.iter().map(|v| v.max(0.0)).collect();
                cache.pre_activations.push(out);
            } else {
                current = out;
            }
        }
        (current, cache)
    }

    pub fn backward(&mut self, cache: &MlpCache, grad_out: &[f64]) {
        let mut grad = grad_out.to_vec();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            if i < last {
                grad = grad
                    .iter()
                    .zip(&cache.pre_activations[i])
                    .map(|(g, z)| if *z > 0.0 { *g } else { 0.0 })
                    .collect();
            }
            grad = layer.backward(&cache.inputs[i], &grad);
        }
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.layers.iter_mut().flat_map(|l| l.params_mut())
    }

    /// Mean sparsity penalty over the first layer's weights
    pub fn sparsity_penalty(&self) -> f64 {
        let weights = self.layers[0].weights();
        weights.iter().map(|w| weight_sparsity(w.value)).sum::<f64>() / weights.len() as f64
    }

    /// Add `scale` times the gradient of [`Mlp::sparsity_penalty`]
    pub fn add_sparsity_grad(&mut self, scale: f64) {
        let weights = self.layers[0].weights_mut();
        let n = weights.len() as f64;
        for w in weights.iter_mut() {
            w.grad += scale * weight_sparsity_grad(w.value) / n;
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Saturating penalty that is steep near zero and flat for large weights
pub fn weight_sparsity(w: f64) -> f64 {
    let a = w.abs() + 1e-4;
    2.0 * sigmoid(3.0 * a.cbrt()) - 1.0
}

/// Derivative of [`weight_sparsity`]
pub fn weight_sparsity_grad(w: f64) -> f64 {
    let a = w.abs() + 1e-4;
    let s = sigmoid(3.0 * a.cbrt());
    let d_da = 2.0 * s * (1.0 - s) * a.powf(-2.0 / 3.0);
    if w >= 0.0 {
        d_da
    } else {
        -d_da
    }
}

/// One-cycle learning rate: cosine warm-up to `max_lr`, then cosine decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneCycleSchedule {
    pub max_lr: f64,
    pub total_steps: usize,
    pub pct_start: f64,
    pub div_factor: f64,
    pub final_div_factor: f64,
}

impl OneCycleSchedule {
    pub fn new(max_lr: f64, total_steps: usize) -> Self {
        Self {
            max_lr,
            total_steps: total_steps.max(1),
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 1e4,
        }
    }

    /// Learning rate at a zero-based step
    pub fn lr(&self, step: usize) -> f64 {
        let initial = self.max_lr / self.div_factor;
        let min = initial / self.final_div_factor;
        let warmup = ((self.pct_start * self.total_steps as f64) as usize).max(1);
        let step = step.min(self.total_steps);
        if step < warmup {
            cosine(initial, self.max_lr, step as f64 / warmup as f64)
        } else {
            let rest = (self.total_steps - warmup).max(1);
            cosine(self.max_lr, min, (step - warmup) as f64 / rest as f64)
        }
    }
}

fn cosine(start: f64, end: f64, pct: f64) -> f64 {
    end + (start - end) / 2.0 * ((PI * pct).cos() + 1.0)
}
