//! Small descriptive statistics shared by the conditioner, the initial-guess
//! heuristics and the scorer.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// `max - min`, or 0 for an empty slice.
pub fn span(values: &[f64]) -> f64 {
    min_max(values).map(|(lo, hi)| hi - lo).unwrap_or(0.0)
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to `[0, 1]`. Position is `q * (n - 1)` on the sorted values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    quantile_sorted(&sorted, q)
}

/// Same as [`quantile`] for already sorted input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() as f64 - 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Residual sum of squares.
pub fn rss(y: &[f64], y_fit: &[f64]) -> f64 {
    y.iter()
        .zip(y_fit.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

/// Coefficient of determination `1 - RSS/TSS`.
///
/// A constant `y` has `TSS = 0`: the result is 1 for an exact prediction and 0
/// otherwise.
pub fn r_squared(y: &[f64], y_fit: &[f64]) -> f64 {
    let Some(m) = mean(y) else {
        return f64::NAN;
    };
    let tss: f64 = y.iter().map(|v| (v - m) * (v - m)).sum();
    let rss = rss(y, y_fit);
    if tss == 0.0 {
        return if rss == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - rss / tss
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile(&v, 0.25), Some(2.0));
        assert_eq!(quantile(&v, 0.75), Some(4.0));
        let q = quantile(&[1.0, 2.0, 3.0, 4.0], 0.25).unwrap();
        assert!((q - 1.75).abs() < 1e-12);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let s = sample_std(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((s - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn r_squared_constant_signal() {
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.5]), 0.0);
    }

    #[test]
    fn r_squared_flat_prediction_is_zero() {
        let y = [1.0, 2.0, 3.0];
        let r2 = r_squared(&y, &[2.0, 2.0, 2.0]);
        assert!(r2.abs() < 1e-12);
    }
}
