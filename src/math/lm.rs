//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimises `Σ (y_i - f(x_i, θ))^2` from a starting point. The model is passed
//! as a closure that writes `f(x_i, θ)` for every observation, so the solver
//! does not know anything about the model forms.
//!
//! Numerical notes:
//! - The Jacobian of `f` comes from `finitediff` forward differences taken in
//!   scaled coordinates `u_j = θ_j / s_j` with `s_j = |θ_j|` (1 when `θ_j = 0`),
//!   so the effective step is `sqrt(eps) * |θ_j|`.
//! - Damping uses Marquardt's diagonal scaling and Nielsen's update rule.
//! - Every model evaluation, including the `k + 1` spent on each Jacobian,
//!   counts against `max_evaluations`.
//! - A raised cancel flag stops the solver at the next iteration.

use std::cell::Cell;

use finitediff::FiniteDiff;
use nalgebra::{DMatrix, DVector};

use crate::domain::CancelFlag;

/// Relative tolerances match the usual MINPACK defaults.
const DEFAULT_TOL: f64 = 1.49012e-8;

/// Floor for the Marquardt scaling of a parameter with a zero column.
const DIAG_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LmSettings {
    pub max_evaluations: usize,
    /// Stop when an accepted step reduces the cost by less than `ftol * cost`.
    pub ftol: f64,
    /// Stop when the proposed step is smaller than `xtol * (|θ| + xtol)`.
    pub xtol: f64,
    pub cancel: Option<CancelFlag>,
}

impl LmSettings {
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ftol: DEFAULT_TOL,
            xtol: DEFAULT_TOL,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// `f(x_i, θ̂)` for every observation.
    pub predicted: Vec<f64>,
    /// `∂f/∂θ` at the solution, `n × k`.
    pub jacobian: DMatrix<f64>,
    pub rss: f64,
    pub evaluations: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LmError {
    /// The objective is NaN/inf at the starting point.
    NonFiniteStart,
    /// The evaluation budget ran out before a stopping rule fired.
    MaxEvaluations { evaluations: usize },
    /// The damped normal equations could not be solved.
    Singular,
    /// The cancel flag was raised.
    Cancelled,
}

/// Run Levenberg–Marquardt on `y ≈ f(θ)`.
///
/// `model(θ, out)` must fill `out` (length `y.len()`) with predictions.
pub fn minimize<F>(model: F, y: &[f64], start: &[f64], settings: LmSettings) -> Result<LmSolution, LmError>
where
    F: Fn(&[f64], &mut [f64]),
{
    let n = y.len();
    let evaluations = Cell::new(0usize);
    let predict = |theta: &[f64]| {
        evaluations.set(evaluations.get() + 1);
        let mut out = vec![0.0; n];
        model(theta, &mut out);
        out
    };
    let eval = |theta: &[f64], out: &mut [f64]| {
        evaluations.set(evaluations.get() + 1);
        model(theta, out);
        cost_of(y, out)
    };
    let exhausted = || evaluations.get() > settings.max_evaluations;

    let mut theta = start.to_vec();
    let mut predicted = vec![0.0; n];
    let mut cost = eval(&theta, &mut predicted);
    if !cost.is_finite() {
        return Err(LmError::NonFiniteStart);
    }

    let mut mu: Option<f64> = None;
    let mut nu = 2.0;
    let mut iterations = 0usize;
    let mut candidate = vec![0.0; n];

    'outer: loop {
        iterations += 1;
        if settings.cancelled() {
            return Err(LmError::Cancelled);
        }
        let jac = forward_jacobian(&predict, &theta).ok_or(LmError::Singular)?;
        if exhausted() {
            return Err(LmError::MaxEvaluations {
                evaluations: evaluations.get(),
            });
        }

        let r = DVector::from_iterator(n, y.iter().zip(predicted.iter()).map(|(a, b)| a - b));
        let g = jac.transpose() * &r;
        if g.amax() == 0.0 {
            break 'outer;
        }
        let a = jac.transpose() * &jac;
        let damping = mu.get_or_insert_with(|| {
            let max_diag = (0..a.nrows()).map(|i| a[(i, i)]).fold(0.0_f64, f64::max);
            1e-3 * max_diag.max(DIAG_FLOOR)
        });

        loop {
            let Some(delta) = solve_damped(&a, &g, *damping) else {
                *damping *= nu;
                nu *= 2.0;
                if !damping.is_finite() {
                    return Err(LmError::Singular);
                }
                continue;
            };

            let theta_norm = theta.iter().map(|v| v * v).sum::<f64>().sqrt();
            if delta.norm() <= settings.xtol * (theta_norm + settings.xtol) {
                break 'outer;
            }

            let trial: Vec<f64> = theta.iter().zip(delta.iter()).map(|(t, d)| t + d).collect();
            let trial_cost = eval(&trial, &mut candidate);
            if exhausted() {
                return Err(LmError::MaxEvaluations {
                    evaluations: evaluations.get(),
                });
            }

            if trial_cost.is_finite() && trial_cost < cost {
                let actual = cost - trial_cost;
                let scaled: DVector<f64> = DVector::from_iterator(
                    delta.len(),
                    delta
                        .iter()
                        .enumerate()
                        .map(|(i, d)| *damping * a[(i, i)].max(DIAG_FLOOR) * d),
                );
                let predicted_gain = delta.dot(&(scaled + &g));
                let rho = if predicted_gain > 0.0 { actual / predicted_gain } else { 1.0 };
                *damping *= (1.0 - (2.0 * rho - 1.0).powi(3)).max(1.0 / 3.0);
                nu = 2.0;

                let converged = actual <= settings.ftol * cost || trial_cost == 0.0;
                theta = trial;
                std::mem::swap(&mut predicted, &mut candidate);
                cost = trial_cost;
                if converged {
                    break 'outer;
                }
                continue 'outer;
            }

            *damping *= nu;
            nu *= 2.0;
            if !damping.is_finite() {
                return Err(LmError::Singular);
            }
        }
    }

    let jacobian = forward_jacobian(&predict, &theta).ok_or(LmError::Singular)?;
    Ok(LmSolution {
        params: theta,
        predicted,
        jacobian,
        rss: cost,
        evaluations: evaluations.get(),
        iterations,
    })
}

fn cost_of(y: &[f64], predicted: &[f64]) -> f64 {
    y.iter()
        .zip(predicted.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

/// Forward-difference `∂f/∂θ` at `theta` as an `n × k` matrix.
///
/// `None` when the model is not finite around `theta`.
fn forward_jacobian<P>(predict: &P, theta: &[f64]) -> Option<DMatrix<f64>>
where
    P: Fn(&[f64]) -> Vec<f64>,
{
    let scale: Vec<f64> = theta.iter().map(|t| if *t == 0.0 { 1.0 } else { t.abs() }).collect();
    let scaled: Vec<f64> = theta.iter().zip(&scale).map(|(t, s)| t / s).collect();
    let in_model_units = |u: &Vec<f64>| {
        let theta: Vec<f64> = u.iter().zip(&scale).map(|(u, s)| u * s).collect();
        predict(theta.as_slice())
    };

    // One row per parameter: `rows[j][i] = ∂f_i/∂u_j`.
    let rows = scaled.forward_jacobian(&in_model_units);
    let n = rows.first().map_or(0, Vec::len);
    if rows.len() != theta.len() || rows.iter().any(|r| r.len() != n) {
        return None;
    }
    let jac = DMatrix::from_fn(n, theta.len(), |i, j| rows[j][i] / scale[j]);
    jac.iter().all(|v| v.is_finite()).then_some(jac)
}

fn solve_damped(a: &DMatrix<f64>, g: &DVector<f64>, mu: f64) -> Option<DVector<f64>> {
    let mut damped = a.clone();
    for i in 0..a.nrows() {
        damped[(i, i)] += mu * a[(i, i)].max(DIAG_FLOOR);
    }

    let finite = |v: &DVector<f64>| v.iter().all(|x| x.is_finite());
    if let Some(chol) = damped.clone().cholesky() {
        let delta = chol.solve(g);
        if finite(&delta) {
            return Some(delta);
        }
    }
    damped.lu().solve(g).filter(finite)
}
