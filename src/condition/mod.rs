//! Sample conditioning: outlier removal before fitting.
//!
//! Every filter looks at `y` only and returns a new sample with the surviving
//! rows in their original order. Filters never fail; a sample too small for a
//! method passes through unchanged. The result may be empty, and the caller
//! decides whether enough rows remain.

pub mod isolation;

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{OutlierMethod, Sample};
use crate::error::EngineError;
use crate::math::stats::{mean, quantile, sample_std};

pub use isolation::ForestSettings;

pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;
pub const DEFAULT_LOWER_PERCENTILE: f64 = 5.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 95.0;
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Smallest sample the IQR filter acts on.
const IQR_MIN_ROWS: usize = 4;
/// Smallest sample the isolation forest acts on.
const FOREST_MIN_ROWS: usize = 10;

/// Method parameters; each method reads only its own fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConditionParams {
    pub multiplier: f64,
    pub threshold: f64,
    /// Percent, `0..=100`.
    pub lower_percentile: f64,
    /// Percent, `0..=100`.
    pub upper_percentile: f64,
    pub contamination: f64,
}

impl Default for ConditionParams {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_IQR_MULTIPLIER,
            threshold: DEFAULT_ZSCORE_THRESHOLD,
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
            contamination: DEFAULT_CONTAMINATION,
        }
    }
}

impl ConditionParams {
    /// Read parameters from a name → value map; missing names keep their defaults.
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        let d = Self::default();
        let get = |name: &str, default: f64| map.get(name).copied().unwrap_or(default);
        Self {
            multiplier: get("multiplier", d.multiplier),
            threshold: get("threshold", d.threshold),
            lower_percentile: get("lower_percentile", d.lower_percentile),
            upper_percentile: get("upper_percentile", d.upper_percentile),
            contamination: get("contamination", d.contamination),
        }
    }
}

/// Output of a conditioning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conditioned {
    pub sample: Sample,
    pub removed: usize,
    /// The method that actually ran (differs from the request on fallback).
    pub method: OutlierMethod,
}

/// Filter `sample` with `method`.
pub fn condition(sample: &Sample, method: OutlierMethod, params: &ConditionParams) -> Conditioned {
    let (keep, method) = inlier_mask(sample.y(), method, params);
    let filtered = sample.retain(&keep);
    let removed = sample.len() - filtered.len();
    if removed > 0 {
        log::info!("{method:?} removed {removed} of {} row(s)", sample.len());
    }
    Conditioned {
        sample: filtered,
        removed,
        method,
    }
}

/// Column-oriented entry point with a method name and a parameter map.
///
/// Unknown method names fall back to IQR. Returns `(x', y', removed)`.
pub fn condition_xy(
    x: &[f64],
    y: &[f64],
    method: &str,
    params: &HashMap<String, f64>,
) -> Result<(Vec<f64>, Vec<f64>, usize), EngineError> {
    if x.len() != y.len() {
        return Err(EngineError::InvalidSample(format!(
            "x and y must have the same length (x={}, y={})",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Ok((Vec::new(), Vec::new(), 0));
    }
    let sample = Sample::new(x.to_vec(), y.to_vec())?;
    let out = condition(&sample, OutlierMethod::from_name(method), &ConditionParams::from_map(params));
    Ok((out.sample.x().to_vec(), out.sample.y().to_vec(), out.removed))
}

/// Keep mask for `y` plus the method that produced it.
fn inlier_mask(y: &[f64], method: OutlierMethod, params: &ConditionParams) -> (Vec<bool>, OutlierMethod) {
    match method {
        OutlierMethod::Iqr => (iqr_mask(y, params.multiplier), method),
        OutlierMethod::Zscore => (zscore_mask(y, params.threshold), method),
        OutlierMethod::Percentile => (
            percentile_mask(y, params.lower_percentile, params.upper_percentile),
            method,
        ),
        OutlierMethod::IsolationForest => {
            let c = params.contamination;
            if !(c.is_finite() && c > 0.0 && c <= 0.5) {
                log::warn!("contamination {c} outside (0, 0.5]; using iqr instead of isolation forest");
                return (iqr_mask(y, DEFAULT_IQR_MULTIPLIER), OutlierMethod::Iqr);
            }
            if y.len() < FOREST_MIN_ROWS {
                return (vec![true; y.len()], method);
            }
            (isolation::inlier_mask(y, c, ForestSettings::default()), method)
        }
    }
}

/// Keep `y` in `[Q1 - m·IQR, Q3 + m·IQR]`.
fn iqr_mask(y: &[f64], multiplier: f64) -> Vec<bool> {
    if y.len() < IQR_MIN_ROWS {
        return vec![true; y.len()];
    }
    let (Some(q1), Some(q3)) = (quantile(y, 0.25), quantile(y, 0.75)) else {
        return vec![true; y.len()];
    };
    let iqr = q3 - q1;
    let lo = q1 - multiplier * iqr;
    let hi = q3 + multiplier * iqr;
    y.iter().map(|&v| v >= lo && v <= hi).collect()
}

/// Keep `|y - mean| / std < threshold`.
fn zscore_mask(y: &[f64], threshold: f64) -> Vec<bool> {
    let (Some(m), Some(s)) = (mean(y), sample_std(y)) else {
        return vec![true; y.len()];
    };
    if s == 0.0 {
        return vec![true; y.len()];
    }
    y.iter().map(|&v| ((v - m) / s).abs() < threshold).collect()
}

fn percentile_mask(y: &[f64], lower: f64, upper: f64) -> Vec<bool> {
    let (Some(lo), Some(hi)) = (quantile(y, lower / 100.0), quantile(y, upper / 100.0)) else {
        return vec![true; y.len()];
    };
    y.iter().map(|&v| v >= lo && v <= hi).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(y: &[f64]) -> Sample {
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        Sample::new(x, y.to_vec()).unwrap()
    }

    #[test]
    fn iqr_removes_single_spike_and_keeps_order() {
        let s = sample(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let out = condition(&s, OutlierMethod::Iqr, &ConditionParams::default());
        assert_eq!(out.removed, 1);
        assert_eq!(out.sample.y(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.sample.x(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn iqr_is_noop_below_four_rows() {
        let s = sample(&[1.0, 2.0, 1000.0]);
        let out = condition(&s, OutlierMethod::Iqr, &ConditionParams::default());
        assert_eq!(out.removed, 0);
    }

    #[test]
    fn zscore_skips_constant_samples() {
        let s = sample(&[5.0; 6]);
        let out = condition(&s, OutlierMethod::Zscore, &ConditionParams::default());
        assert_eq!(out.removed, 0);
    }

    #[test]
    fn zscore_threshold_is_strict() {
        // mean 2, std 1: the 3.0 row has |z| = 1.
        let s = sample(&[1.0, 2.0, 3.0]);
        let params = ConditionParams {
            threshold: 1.0,
            ..ConditionParams::default()
        };
        let out = condition(&s, OutlierMethod::Zscore, &params);
        assert_eq!(out.sample.y(), &[2.0]);
    }

    #[test]
    fn percentile_bounds_are_inclusive() {
        let s = sample(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let params = ConditionParams {
            lower_percentile: 0.0,
            upper_percentile: 100.0,
            ..ConditionParams::default()
        };
        assert_eq!(condition(&s, OutlierMethod::Percentile, &params).removed, 0);

        let out = condition(&s, OutlierMethod::Percentile, &ConditionParams::default());
        assert_eq!(out.sample.y(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn isolation_forest_needs_ten_rows() {
        let s = sample(&[1.0, 1.1, 0.9, 1.0, 50.0]);
        let out = condition(&s, OutlierMethod::IsolationForest, &ConditionParams::default());
        assert_eq!(out.removed, 0);
        assert_eq!(out.method, OutlierMethod::IsolationForest);
    }

    #[test]
    fn invalid_contamination_falls_back_to_iqr() {
        let s = sample(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let params = ConditionParams {
            contamination: 0.9,
            ..ConditionParams::default()
        };
        let out = condition(&s, OutlierMethod::IsolationForest, &params);
        assert_eq!(out.method, OutlierMethod::Iqr);
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn isolation_forest_handles_values_near_f64_max() {
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let mut y: Vec<f64> = (0..12).map(|i| (i % 3) as f64).collect();
        y[3] = 1.7e308;
        y[8] = -1.7e308;
        let (xs, ys, removed) = condition_xy(&x, &y, "isolation_forest", &HashMap::new()).unwrap();
        assert_eq!(xs.len() + removed, 12);
        assert_eq!(xs.len(), ys.len());

        y[5] = f64::INFINITY;
        let (xs, _, removed) = condition_xy(&x, &y, "isolation_forest", &HashMap::new()).unwrap();
        assert_eq!(xs.len() + removed, 12);
    }

    #[test]
    fn string_entry_point_maps_unknown_method_to_iqr() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0, 100.0];
        let (xs, ys, removed) = condition_xy(&x, &y, "mystery", &HashMap::new()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(ys, vec![1.0, 2.0, 3.0, 4.0]);

        let mut params = HashMap::new();
        params.insert("multiplier".to_string(), 100.0);
        let (_, _, removed) = condition_xy(&x, &y, "iqr", &params).unwrap();
        assert_eq!(removed, 0);
    }
}
