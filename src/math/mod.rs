//! Mathematical utilities: least squares (linear and Levenberg–Marquardt),
//! parameter covariance and small descriptive statistics.

pub mod lm;
pub mod ols;
pub mod stats;

pub use ols::*;
