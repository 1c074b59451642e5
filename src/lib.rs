//! `phys-fit` library crate.
//!
//! Picks the best-fitting model for a set of `(x, y)` measurements from a
//! catalog of common physical forms (linear, quadratic, exponential, power
//! law, logarithmic, sine), after optional outlier removal.
//!
//! The binary (`pfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engine can be embedded by other tools
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod condition;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;

pub use condition::{condition, condition_xy};
pub use domain::{Analysis, SelectionOutcome};
pub use error::EngineError;
pub use fit::select_best_model;
