//! Command-line parsing for the `pfit` model selector.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_COMPLEXITY_PENALTY, DEFAULT_MAX_EVALUATIONS, ModelKind, OutlierMethod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pfit", version, about = "Automatic model selection for (x, y) measurements")]
pub struct Cli {
    /// Model catalog JSON (falls back to $PHYS_FIT_CATALOG, then the built-in catalog).
    #[arg(long, global = true, value_name = "JSON")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every candidate model to a CSV sample, print diagnostics and optionally plot/export.
    Fit(FitArgs),
    /// Print the ranked alternatives only (useful for scripting).
    Rank(FitArgs),
    /// Generate a synthetic noisy sample from a known model and analyse it.
    Demo(DemoArgs),
    /// List the active model catalog.
    Models,
}

/// Options for fitting a CSV file.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input CSV with a header row.
    #[arg(short = 'f', long, value_name = "CSV")]
    pub file: PathBuf,

    /// Column holding x (default: `x`, else the first column).
    #[arg(long)]
    pub x_col: Option<String>,

    /// Column holding y (default: `y`, else the second column).
    #[arg(long)]
    pub y_col: Option<String>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Options for the synthetic demo.
#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Model used to generate the sample.
    #[arg(long, value_enum, default_value_t = ModelKind::Exponential)]
    pub generator: ModelKind,

    /// Ground-truth parameters, comma separated (default: a textbook set per model).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Option<Vec<f64>>,

    /// Noise sigma as a fraction of the clean y range.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Number of observations.
    #[arg(short = 'n', long, default_value_t = 40)]
    pub count: usize,

    #[arg(long, default_value_t = 0.5)]
    pub x_min: f64,

    #[arg(long, default_value_t = 10.0)]
    pub x_max: f64,

    /// Number of observations replaced by large spikes.
    #[arg(long, default_value_t = 0)]
    pub spikes: usize,

    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

/// Conditioning, selection and output options shared by `fit`, `rank` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct AnalysisArgs {
    /// Remove outliers before fitting.
    #[arg(long)]
    pub remove_outliers: bool,

    #[arg(long, value_enum, default_value_t = OutlierMethod::Iqr)]
    pub outlier_method: OutlierMethod,

    /// IQR fence multiplier.
    #[arg(long)]
    pub outlier_multiplier: Option<f64>,

    /// Z-score threshold.
    #[arg(long)]
    pub outlier_threshold: Option<f64>,

    /// Lower percentile bound (0-100).
    #[arg(long)]
    pub lower_percentile: Option<f64>,

    /// Upper percentile bound (0-100).
    #[arg(long)]
    pub upper_percentile: Option<f64>,

    /// Expected outlier fraction for the isolation forest, in (0, 0.5].
    #[arg(long)]
    pub contamination: Option<f64>,

    /// Restrict candidates to these catalog keys (repeatable).
    #[arg(long = "model", value_name = "KEY")]
    pub models: Vec<String>,

    /// Complexity penalty λ in `R² · (1 − λ·k)`.
    #[arg(long, default_value_t = DEFAULT_COMPLEXITY_PENALTY)]
    pub lambda: f64,

    /// Function-evaluation budget per nonlinear fit.
    #[arg(long, default_value_t = DEFAULT_MAX_EVALUATIONS)]
    pub max_evals: usize,

    /// Favour a good linear fit (score × 1.15 when R² > 0.90).
    #[arg(long)]
    pub linear_bonus: bool,

    /// Give up on model selection after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Show the top-N ranked models.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Render an ASCII plot of the sample and the trend curve.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the full analysis to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export fitted values and residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}
