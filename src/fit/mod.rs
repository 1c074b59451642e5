//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit each catalog entry (closed form or Levenberg–Marquardt)
//! - score the fits and rank them (parallel over models)

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
