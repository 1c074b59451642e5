//! Low-level fitting routine for a single model.
//!
//! Given a sample and a catalog entry we:
//! - solve `linear` in closed form (SVD least squares on `[x 1]`)
//! - minimise the residual sum of squares of every other form with
//!   Levenberg–Marquardt from a data-driven starting point
//! - derive the parameter covariance `s² (JᵀJ)⁻¹` at the optimum
//!
//! Scoring happens one level up, in `selection`.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CancelFlag, EngineConfig, ModelKind, Sample};
use crate::error::FitFailure;
use crate::math::lm::{self, LmError, LmSettings};
use crate::math::{covariance, solve_least_squares, standard_errors};
use crate::models::{ModelSpec, initial_guess, predict_all, predict_into};

/// Raw least-squares estimate for one model.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub params: Vec<f64>,
    /// `None` when the covariance is undetermined (`n <= k`) or singular.
    pub standard_errors: Option<Vec<f64>>,
    pub predicted: Vec<f64>,
    pub rss: f64,
    /// Model evaluations spent (0 for the closed form).
    pub evaluations: usize,
}

/// Fit a single catalog entry to the sample.
pub fn fit_model(spec: &ModelSpec, sample: &Sample, config: &EngineConfig) -> Result<ModelFit, FitFailure> {
    if config.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
        return Err(FitFailure::Cancelled { model: spec.kind });
    }
    match spec.kind {
        ModelKind::Linear => fit_linear(sample),
        kind => fit_nonlinear(kind, starting_point(spec, sample), sample, config),
    }
}

/// Starting point for the solver.
///
/// Forms with a data-driven guess always use it; the catalog guess only
/// replaces the generic one.
pub fn starting_point(spec: &ModelSpec, sample: &Sample) -> Vec<f64> {
    match (spec.kind, &spec.initial_guess) {
        (ModelKind::Linear | ModelKind::Quadratic, Some(guess)) => guess.clone(),
        (kind, _) => initial_guess(kind, sample),
    }
}

fn fit_linear(sample: &Sample) -> Result<ModelFit, FitFailure> {
    let model = ModelKind::Linear;
    let n = sample.len();
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { sample.x()[i] } else { 1.0 });
    let y = DVector::from_column_slice(sample.y());

    let beta = solve_least_squares(&design, &y).ok_or(FitFailure::Singular { model })?;
    let params = vec![beta[0], beta[1]];
    finish(model, params, &design, sample, 0)
}

fn fit_nonlinear(
    model: ModelKind,
    start: Vec<f64>,
    sample: &Sample,
    config: &EngineConfig,
) -> Result<ModelFit, FitFailure> {
    let expected = model.param_count();
    if start.len() != expected {
        return Err(FitFailure::BadInitialGuess {
            model,
            expected,
            found: start.len(),
        });
    }

    let xs = sample.x();
    let solution = lm::minimize(
        |theta, out| predict_into(model, xs, theta, out),
        sample.y(),
        &start,
        LmSettings::with_max_evaluations(config.max_evaluations).with_cancel(config.cancel.clone()),
    )
    .map_err(|e| match e {
        LmError::NonFiniteStart => FitFailure::NonFiniteStart { model },
        LmError::MaxEvaluations { evaluations } => FitFailure::NotConverged { model, evaluations },
        LmError::Singular => FitFailure::Singular { model },
        LmError::Cancelled => FitFailure::Cancelled { model },
    })?;

    log::trace!(
        "{model:?}: converged after {} iteration(s), {} evaluation(s)",
        solution.iterations,
        solution.evaluations
    );
    finish(model, solution.params, &solution.jacobian, sample, solution.evaluations)
}

fn finish(
    model: ModelKind,
    params: Vec<f64>,
    jacobian: &DMatrix<f64>,
    sample: &Sample,
    evaluations: usize,
) -> Result<ModelFit, FitFailure> {
    let predicted = predict_all(model, sample.x(), &params);
    if params.iter().chain(predicted.iter()).any(|v| !v.is_finite()) {
        return Err(FitFailure::NonFinitePrediction { model });
    }
    let rss = crate::math::stats::rss(sample.y(), &predicted);
    let standard_errors = covariance(jacobian, rss).and_then(|cov| standard_errors(&cov));

    Ok(ModelFit {
        model,
        params,
        standard_errors,
        predicted,
        rss,
        evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Catalog;

    fn spec(kind: ModelKind) -> ModelSpec {
        Catalog::builtin().get(kind).cloned().unwrap()
    }

    #[test]
    fn linear_closed_form_recovers_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 3.0).collect();
        let s = Sample::new(x, y).unwrap();
        let fit = fit_model(&spec(ModelKind::Linear), &s, &EngineConfig::default()).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 1e-10);
        assert!((fit.params[1] - 3.0).abs() < 1e-10);
        assert!(fit.rss < 1e-18);
        assert_eq!(fit.evaluations, 0);
    }

    #[test]
    fn linear_standard_errors_match_textbook() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![0.1, 0.9, 2.2, 2.8, 4.1];
        let s = Sample::new(x.clone(), y).unwrap();
        let fit = fit_model(&spec(ModelKind::Linear), &s, &EngineConfig::default()).unwrap();
        let se = fit.standard_errors.unwrap();
        // Var(slope) = s² / Σ(x - x̄)², Σ(x - x̄)² = 10.
        let s2 = fit.rss / 3.0;
        assert!((se[0] - (s2 / 10.0).sqrt()).abs() < 1e-10);
    }

    #[test]
    fn two_points_have_no_standard_errors() {
        let s = Sample::new(vec![0.0, 1.0], vec![1.0, 3.0]).unwrap();
        let fit = fit_model(&spec(ModelKind::Linear), &s, &EngineConfig::default()).unwrap();
        assert!(fit.standard_errors.is_none());
        assert!(fit.rss < 1e-20);
    }

    #[test]
    fn quadratic_recovers_parabola() {
        let x: Vec<f64> = (0..15).map(|i| i as f64 * 0.5 - 3.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.5 * v * v - 2.0 * v + 1.0).collect();
        let s = Sample::new(x, y).unwrap();
        let fit = fit_model(&spec(ModelKind::Quadratic), &s, &EngineConfig::default()).unwrap();
        assert!((fit.params[0] - 0.5).abs() < 1e-6);
        assert!((fit.params[1] + 2.0).abs() < 1e-6);
        assert!((fit.params[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn exponential_overflow_at_start_is_a_failure() {
        // A huge x range makes the default b guess overflow immediately.
        let s = Sample::new(vec![0.0, 1.0e6, 2.0e6], vec![1.0, 2.0, 3.0]).unwrap();
        let err = fit_model(&spec(ModelKind::Exponential), &s, &EngineConfig::default()).unwrap_err();
        assert_eq!(err, FitFailure::NonFiniteStart { model: ModelKind::Exponential });
    }

    #[test]
    fn catalog_guess_only_replaces_generic_start() {
        let s = Sample::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 4.0]).unwrap();
        let mut quad = spec(ModelKind::Quadratic);
        quad.initial_guess = Some(vec![0.5, 0.5, 0.5]);
        assert_eq!(starting_point(&quad, &s), vec![0.5, 0.5, 0.5]);

        let mut exp = spec(ModelKind::Exponential);
        exp.initial_guess = Some(vec![9.0, 9.0, 9.0]);
        assert_eq!(starting_point(&exp, &s), vec![3.0, 0.01, 1.0]);
    }
}
