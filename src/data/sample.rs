//! Synthetic noisy samples for demos and tests.
//!
//! Observations are taken on an even x grid (like a bench measurement series),
//! evaluated with a known model and perturbed with Gaussian noise whose sigma is
//! a fraction of the clean signal's range. A few rows can be turned into spikes
//! to exercise outlier removal.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ModelKind, Sample};
use crate::error::{AppError, EXIT_INPUT};
use crate::math::stats::span;
use crate::models::predict_all;

/// Size of a planted spike, in noise sigmas.
const SPIKE_SIGMAS: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub model: ModelKind,
    /// Ground-truth parameters; `None` uses [`default_params`].
    pub params: Option<Vec<f64>>,
    pub count: usize,
    pub x_min: f64,
    pub x_max: f64,
    /// Noise sigma as a fraction of the clean y range.
    pub noise: f64,
    /// Number of rows replaced by spikes.
    pub spikes: usize,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Linear,
            params: None,
            count: 40,
            x_min: 0.5,
            x_max: 10.0,
            noise: 0.02,
            spikes: 0,
            seed: 42,
        }
    }
}

/// Plausible textbook parameters for each form.
pub fn default_params(model: ModelKind) -> Vec<f64> {
    match model {
        ModelKind::Linear => vec![9.8, 0.0],
        ModelKind::Quadratic => vec![-4.9, 20.0, 1.5],
        ModelKind::Exponential => vec![2.0, 0.3, 1.0],
        ModelKind::PowerLaw => vec![3.0, 1.5, 0.0],
        ModelKind::Logarithmic => vec![2.0, 1.0],
        ModelKind::Sine => vec![2.0, 1.5, 0.3, 1.0],
    }
}

#[derive(Debug, Clone)]
pub struct DemoSample {
    pub sample: Sample,
    /// Noise-free model values at each x.
    pub truth: Vec<f64>,
    pub params: Vec<f64>,
}

pub fn generate_sample(config: &DemoConfig) -> Result<DemoSample, AppError> {
    if config.count < 2 {
        return Err(AppError::new(EXIT_INPUT, "Sample count must be >= 2."));
    }
    if !(config.x_min.is_finite() && config.x_max.is_finite() && config.x_max > config.x_min) {
        return Err(AppError::new(EXIT_INPUT, "Invalid x range for sample generation."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(EXIT_INPUT, "Noise level must be finite and >= 0."));
    }
    if config.spikes > config.count / 2 {
        return Err(AppError::new(EXIT_INPUT, "At most half of the rows can be spikes."));
    }

    let params = config.params.clone().unwrap_or_else(|| default_params(config.model));
    let k = config.model.param_count();
    if params.len() != k {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("{} takes {k} parameters, got {}.", config.model.key(), params.len()),
        ));
    }

    let step = (config.x_max - config.x_min) / (config.count as f64 - 1.0);
    let xs: Vec<f64> = (0..config.count).map(|i| config.x_min + step * i as f64).collect();
    let truth = predict_all(config.model, &xs, &params);
    if truth.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(EXIT_INPUT, "Model is not finite on the requested x range."));
    }

    let sigma = config.noise * span(&truth).max(1e-12);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(EXIT_INPUT, format!("Noise distribution error: {e}")))?;

    let mut ys: Vec<f64> = truth.iter().map(|&t| t + sigma * normal.sample(&mut rng)).collect();

    if config.spikes > 0 {
        let spike = SPIKE_SIGMAS * sigma.max(1e-3 * span(&truth).max(1.0));
        for idx in rand::seq::index::sample(&mut rng, config.count, config.spikes) {
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            ys[idx] += sign * spike;
        }
    }

    let sample = Sample::new(xs, ys).map_err(AppError::from)?;
    Ok(DemoSample { sample, truth, params })
}
