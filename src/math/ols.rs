//! Linear least squares and parameter covariance.
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We use SVD to solve the least-squares problem robustly even when the
//!   design matrix is tall (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The same decomposition gives `(JᵀJ)⁻¹ = V Σ⁻² Vᵀ` for the covariance, so we
//!   never form the normal equations explicitly.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Parameter covariance `s² (JᵀJ)⁻¹` with `s² = rss / (n - k)`.
///
/// `jacobian` is `n × k` (rows are observations). Returns `None` when the
/// problem has no residual degrees of freedom or `JᵀJ` is numerically singular;
/// callers must then report the standard errors as unavailable.
pub fn covariance(jacobian: &DMatrix<f64>, rss: f64) -> Option<DMatrix<f64>> {
    let (n, k) = jacobian.shape();
    if k == 0 || n <= k || !rss.is_finite() {
        return None;
    }
    if jacobian.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t.as_ref()?;
    let s = &svd.singular_values;

    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = f64::EPSILON * n.max(k) as f64 * s_max;
    if s_max == 0.0 || s.iter().any(|&sv| sv <= cutoff) {
        return None;
    }

    let s2 = rss / (n - k) as f64;
    let mut cov = DMatrix::<f64>::zeros(k, k);
    for i in 0..k {
        for j in 0..k {
            let mut acc = 0.0;
            for (m, &sv) in s.iter().enumerate() {
                acc += v_t[(m, i)] * v_t[(m, j)] / (sv * sv);
            }
            cov[(i, j)] = acc * s2;
        }
    }

    if cov.iter().all(|v| v.is_finite()) {
        Some(cov)
    } else {
        None
    }
}

/// `sqrt(diag(cov))`, or `None` if any variance is negative or non-finite.
pub fn standard_errors(cov: &DMatrix<f64>) -> Option<Vec<f64>> {
    let k = cov.nrows().min(cov.ncols());
    let mut out = Vec::with_capacity(k);
    for i in 0..k {
        let var = cov[(i, i)];
        if !(var.is_finite() && var >= 0.0) {
            return None;
        }
        out.push(var.sqrt());
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn covariance_matches_textbook_slope_variance() {
        // Design [x, 1] on x = 0..4; Var(slope) = s² / Σ(x - x̄)².
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let mut data = Vec::new();
        for &x in &xs {
            data.push(x);
            data.push(1.0);
        }
        let j = DMatrix::from_row_slice(5, 2, &data);
        let rss = 3.0;
        let cov = covariance(&j, rss).unwrap();
        let s2 = rss / 3.0;
        assert!((cov[(0, 0)] - s2 / 10.0).abs() < 1e-12);
        let se = standard_errors(&cov).unwrap();
        assert!((se[0] - (s2 / 10.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn covariance_absent_without_degrees_of_freedom() {
        let j = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 1.0]);
        assert!(covariance(&j, 0.0).is_none());
    }

    #[test]
    fn covariance_absent_for_collinear_columns() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(covariance(&j, 1.0).is_none());
    }
}
