//! Model evaluation for the six physical forms.
//!
//! The fitter relies on two primitive operations:
//! - predict `y(x)` given a parameter vector (for residuals, plots and LM)
//! - produce a starting point for the nonlinear solver
//!
//! Both are implemented here for each model kind.

use std::f64::consts::PI;

use crate::domain::{ModelKind, Sample};
use crate::math::stats::{mean, min_max, span};

/// Offset that keeps `ln(|x|)` finite at `x = 0`.
pub const LOG_EPSILON: f64 = 1e-10;

/// Predict `y(x)` for the given model kind.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::Linear => params[0] * x + params[1],
        ModelKind::Quadratic => params[0] * x * x + params[1] * x + params[2],
        ModelKind::Exponential => params[0] * (params[1] * x).exp() + params[2],
        ModelKind::PowerLaw => params[0] * x.abs().powf(params[1]) + params[2],
        ModelKind::Logarithmic => params[0] * (x.abs() + LOG_EPSILON).ln() + params[1],
        ModelKind::Sine => params[0] * (params[1] * x + params[2]).sin() + params[3],
    }
}

/// Fill `out[i] = predict(model, xs[i], params)`.
pub fn predict_into(model: ModelKind, xs: &[f64], params: &[f64], out: &mut [f64]) {
    for (o, &x) in out.iter_mut().zip(xs.iter()) {
        *o = predict(model, x, params);
    }
}

pub fn predict_all(model: ModelKind, xs: &[f64], params: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| predict(model, x, params)).collect()
}

/// Data-driven starting point for the nonlinear solver.
///
/// `linear` is solved in closed form, but a guess is still returned so every
/// kind has one.
pub fn initial_guess(model: ModelKind, sample: &Sample) -> Vec<f64> {
    let (y_min, _) = min_max(sample.y()).unwrap_or((0.0, 0.0));
    let y_range = span(sample.y());
    let x_range = span(sample.x());
    let y_mean = mean(sample.y()).unwrap_or(0.0);

    match model {
        ModelKind::Linear => vec![1.0, 0.0],
        ModelKind::Quadratic => vec![1.0, 1.0, 1.0],
        ModelKind::Exponential => vec![y_range, 0.01, y_min],
        ModelKind::PowerLaw => vec![y_mean, 1.0, 0.0],
        ModelKind::Logarithmic => {
            let a = if x_range > 1.0 { y_range / x_range.ln() } else { 1.0 };
            vec![a, y_min]
        }
        ModelKind::Sine => {
            // One period across the x range. Data spanning several periods
            // can settle in a local minimum at this frequency.
            let b = if x_range > 0.0 { 2.0 * PI / x_range } else { 1.0 };
            vec![y_range / 2.0, b, 0.0, y_mean]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_matches_closed_forms() {
        assert_eq!(predict(ModelKind::Linear, 2.0, &[3.0, 1.0]), 7.0);
        assert_eq!(predict(ModelKind::Quadratic, 2.0, &[1.0, 2.0, 3.0]), 11.0);
        assert!((predict(ModelKind::Exponential, 0.0, &[2.0, 5.0, 1.0]) - 3.0).abs() < 1e-12);
        assert!((predict(ModelKind::PowerLaw, -4.0, &[1.0, 0.5, 0.0]) - 2.0).abs() < 1e-12);
        assert!((predict(ModelKind::Sine, 0.0, &[2.0, 1.0, PI / 2.0, 1.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn logarithm_is_finite_at_zero() {
        let y = predict(ModelKind::Logarithmic, 0.0, &[1.0, 0.0]);
        assert!(y.is_finite());
        assert!((y - LOG_EPSILON.ln()).abs() < 1e-9);
    }

    #[test]
    fn initial_guesses_follow_sample_ranges() {
        let s = Sample::new(vec![0.0, 5.0, 10.0], vec![1.0, 4.0, 7.0]).unwrap();
        assert_eq!(initial_guess(ModelKind::Exponential, &s), vec![6.0, 0.01, 1.0]);
        assert_eq!(initial_guess(ModelKind::PowerLaw, &s), vec![4.0, 1.0, 0.0]);

        let log = initial_guess(ModelKind::Logarithmic, &s);
        assert!((log[0] - 6.0 / 10.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log[1], 1.0);

        let sine = initial_guess(ModelKind::Sine, &s);
        assert_eq!(sine[0], 3.0);
        assert!((sine[1] - 2.0 * PI / 10.0).abs() < 1e-12);
        assert_eq!(sine[3], 4.0);
    }

    #[test]
    fn degenerate_x_range_uses_unit_guesses() {
        let s = Sample::new(vec![0.2, 0.5], vec![1.0, 2.0]).unwrap();
        assert_eq!(initial_guess(ModelKind::Logarithmic, &s)[0], 1.0);
        let flat = Sample::new(vec![3.0, 3.0], vec![1.0, 2.0]).unwrap();
        assert_eq!(initial_guess(ModelKind::Sine, &flat)[1], 1.0);
    }
}
