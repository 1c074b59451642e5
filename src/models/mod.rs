//! Candidate model forms.
//!
//! Evaluators are small, pure functions keyed by `ModelKind` so that fitting
//! code can stay generic. Presentation (names, equation templates) and the
//! candidate order come from the catalog.

pub mod catalog;
pub mod model;

pub use catalog::*;
pub use model::*;
