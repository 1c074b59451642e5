//! Result assembly and reporting: rendered equations, the trend curve,
//! residuals and formatted terminal output.

pub mod equation;
pub mod format;

pub use equation::{substitute, to_latex};
pub use format::*;

use crate::domain::{EngineConfig, FitResult, Sample, SelectionOutcome, TrendPoint};
use crate::fit::FitSelection;
use crate::math::stats::min_max;
use crate::models::{Catalog, predict};

/// Turn a ranked selection into the caller-facing outcome.
pub fn assemble(selection: FitSelection, sample: &Sample, catalog: &Catalog, config: &EngineConfig) -> SelectionOutcome {
    let best = selection.best;
    let template = catalog
        .get(best.model_key)
        .map(|spec| spec.equation.as_str())
        .unwrap_or_else(|| best.model_key.key());
    let equation = substitute(template, &best.params);
    let latex = to_latex(&equation);
    let trend = trend_curve(&best, sample.x(), config.trend_points, config.trend_padding);

    SelectionOutcome {
        best,
        ranked: selection.ranked,
        equation,
        latex,
        trend,
        skipped: selection.skipped,
    }
}

/// `points` evenly spaced x values over the sample's x range widened by
/// `padding · range` on each side, evaluated with the fitted model.
///
/// A sample with a single distinct x yields `points` copies of that x.
pub fn trend_curve(fit: &FitResult, xs: &[f64], points: usize, padding: f64) -> Vec<TrendPoint> {
    let Some((lo, hi)) = min_max(xs) else {
        return Vec::new();
    };
    let pad = padding * (hi - lo);
    let start = lo - pad;
    let end = hi + pad;
    let steps = points.max(2) - 1;

    (0..points)
        .map(|i| {
            let x = start + (end - start) * i as f64 / steps as f64;
            TrendPoint {
                x,
                y: predict(fit.model_key, x, &fit.params),
            }
        })
        .collect()
}

/// `y - ŷ` for each row.
pub fn compute_residuals(sample: &Sample, fit: &FitResult) -> Vec<f64> {
    sample
        .y()
        .iter()
        .zip(fit.predicted.iter())
        .map(|(y, y_fit)| y - y_fit)
        .collect()
}
