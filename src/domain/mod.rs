//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input sample (`Sample`) and the closed set of model forms (`ModelKind`)
//! - engine and pipeline configuration (`EngineConfig`, `AnalysisConfig`)
//! - fit outputs (`FitResult`, `SelectionOutcome`, `Analysis`)

pub mod types;

pub use types::*;
