//! Model scoring and selection.
//!
//! Every candidate is fitted (in parallel) and scored with:
//! - R² = 1 - RSS/TSS
//! - adjusted R² = 1 - (1 - R²)(n - 1)/(n - k - 1)
//! - AIC = n·ln(RSS/n) + 2k (informational only)
//! - selection score = R²·(1 - λ·k)
//!
//! Selection rules:
//! 1. Skip underdetermined models (`n < k`)
//! 2. Drop failed fits and fits with non-finite or non-positive R²
//! 3. Rank survivors by descending score; ties keep catalog order

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::domain::{EngineConfig, FitResult, ModelKind, Sample, SelectionOutcome, SkippedModel};
use crate::error::{EngineError, FitFailure};
use crate::fit::fitter::{ModelFit, fit_model};
use crate::math::stats::r_squared;
use crate::models::{Catalog, ModelSpec};

/// Output of fitting + selection, before presentation.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// All surviving fits, best first.
    pub ranked: Vec<FitResult>,
    /// Any models that were skipped or failed, and why (for diagnostics).
    pub skipped: Vec<SkippedModel>,
}

/// Fit one catalog entry and score it.
pub fn fit_one(sample: &Sample, spec: &ModelSpec, config: &EngineConfig) -> Result<FitResult, FitFailure> {
    let fit = fit_model(spec, sample, config)?;
    to_fit_result(fit, spec, sample, config)
}

/// Fit every candidate and rank the survivors.
///
/// `candidates` restricts the pool to the given keys (still in catalog order).
/// Keys that are unknown or absent from the catalog are reported in `skipped`.
pub fn fit_and_select(
    sample: &Sample,
    catalog: &Catalog,
    candidates: Option<&[&str]>,
    config: &EngineConfig,
) -> Result<FitSelection, EngineError> {
    sample.ensure_fittable()?;
    config.validate()?;

    let n = sample.len();
    let mut skipped = Vec::new();

    let requested: Option<Vec<ModelKind>> = candidates.map(|keys| {
        keys.iter()
            .filter_map(|key| match ModelKind::from_key(key) {
                Some(kind) if catalog.get(kind).is_some() => Some(kind),
                Some(_) => {
                    skipped.push(skip(key, "not in the active catalog"));
                    None
                }
                None => {
                    skipped.push(skip(key, "unknown model key"));
                    None
                }
            })
            .collect()
    });

    let mut eligible: Vec<&ModelSpec> = Vec::new();
    for spec in catalog.specs() {
        if let Some(kinds) = &requested {
            if !kinds.contains(&spec.kind) {
                continue;
            }
        }
        let k = spec.param_count();
        if n < k {
            log::debug!("{}: skipped, n={n} < k={k}", spec.key());
            skipped.push(skip(spec.key(), &format!("underdetermined: n={n} < k={k}")));
            continue;
        }
        eligible.push(spec);
    }

    // Collected in catalog order.
    let attempts: Vec<(&ModelSpec, Result<FitResult, FitFailure>)> = eligible
        .par_iter()
        .map(|spec| (*spec, fit_one(sample, spec, config)))
        .collect();

    let attempted = attempts.len();
    let mut ranked = Vec::with_capacity(attempted);
    for (spec, attempt) in attempts {
        match attempt {
            Ok(fit) => ranked.push(fit),
            Err(e) => {
                if matches!(e, FitFailure::Cancelled { .. }) {
                    log::debug!("model `{}` fitting cancelled", spec.key());
                } else {
                    log::warn!("model `{}` fitting failed: {e}", spec.key());
                }
                skipped.push(skip(spec.key(), &e.to_string()));
            }
        }
    }

    if ranked.is_empty() {
        return Err(EngineError::NoModelFitted { attempted });
    }

    rank(&mut ranked);
    let best = ranked[0].clone();
    log::info!(
        "best model: {} (R²={:.4}, score={:.4}) of {} candidate(s)",
        best.model_key.key(),
        best.r_squared,
        best.selection_score,
        ranked.len()
    );

    Ok(FitSelection { best, ranked, skipped })
}

/// Fit, select and assemble the full outcome against the global catalog with
/// the default engine settings.
pub fn select_best_model(
    x: &[f64],
    y: &[f64],
    candidate_keys: Option<&[&str]>,
) -> Result<SelectionOutcome, EngineError> {
    let sample = Sample::new(x.to_vec(), y.to_vec())?;
    select_with(&sample, Catalog::global(), candidate_keys, &EngineConfig::default())
}

/// [`select_best_model`] with an explicit catalog and configuration.
pub fn select_with(
    sample: &Sample,
    catalog: &Catalog,
    candidate_keys: Option<&[&str]>,
    config: &EngineConfig,
) -> Result<SelectionOutcome, EngineError> {
    let selection = fit_and_select(sample, catalog, candidate_keys, config)?;
    Ok(crate::report::assemble(selection, sample, catalog, config))
}

/// Stable sort by descending selection score.
pub fn rank(fits: &mut [FitResult]) {
    fits.sort_by(|a, b| {
        b.selection_score
            .partial_cmp(&a.selection_score)
            .unwrap_or(Ordering::Equal)
    });
}

pub fn adjusted_r_squared(r2: f64, n: usize, k: usize) -> f64 {
    if n > k + 1 {
        1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - k as f64 - 1.0)
    } else {
        r2
    }
}

/// `n·ln(RSS/n) + 2k`, with `RSS/n` floored so exact fits stay finite.
pub fn aic(n: usize, rss: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let rss_per = (rss / n_f).max(f64::MIN_POSITIVE);
    n_f * rss_per.ln() + 2.0 * k as f64
}

pub fn selection_score(model: ModelKind, r2: f64, k: usize, config: &EngineConfig) -> f64 {
    let mut score = r2 * (1.0 - config.complexity_penalty * k as f64);
    if let Some(bonus) = config.linear_bonus {
        if model == ModelKind::Linear && r2 > bonus.min_r_squared {
            score *= bonus.factor;
        }
    }
    score
}

fn to_fit_result(fit: ModelFit, spec: &ModelSpec, sample: &Sample, config: &EngineConfig) -> Result<FitResult, FitFailure> {
    let n = sample.len();
    let k = spec.param_count();
    let r2 = r_squared(sample.y(), &fit.predicted);
    if !(r2.is_finite() && r2 > 0.0) {
        return Err(FitFailure::PoorFit {
            model: fit.model,
            r_squared: r2,
        });
    }

    Ok(FitResult {
        model_key: fit.model,
        name: spec.name.clone(),
        adj_r_squared: adjusted_r_squared(r2, n, k),
        aic: aic(n, fit.rss, k),
        selection_score: selection_score(fit.model, r2, k, config),
        params: fit.params,
        standard_errors: fit.standard_errors,
        predicted: fit.predicted,
        rss: fit.rss,
        r_squared: r2,
        param_count: k,
        n,
    })
}

fn skip(key: &str, reason: &str) -> SkippedModel {
    SkippedModel {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
