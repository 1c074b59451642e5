//! Shared domain types.
//!
//! Outputs are serializable so they can be:
//!
//! - inspected in-memory by callers
//! - exported to JSON/CSV
//! - consumed by downstream renderers and report generators by field name

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default complexity penalty λ in `R² · (1 − λ·k)`.
pub const DEFAULT_COMPLEXITY_PENALTY: f64 = 0.02;
/// Default function-evaluation budget for nonlinear fits.
pub const DEFAULT_MAX_EVALUATIONS: usize = 5000;
/// Number of points on the rendered trend curve.
pub const DEFAULT_TREND_POINTS: usize = 50;
/// Fraction of the x range added on each side of the trend curve.
pub const DEFAULT_TREND_PADDING: f64 = 0.05;

/// An ordered `(x, y)` sample.
///
/// Lengths always agree. A sample produced by conditioning may be empty; the
/// engine itself rejects anything shorter than two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Sample {
    /// Build a sample from raw columns.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, EngineError> {
        if x.is_empty() || y.is_empty() {
            return Err(EngineError::InvalidSample("data cannot be empty".to_string()));
        }
        if x.len() != y.len() {
            return Err(EngineError::InvalidSample(format!(
                "x and y must have the same length (x={}, y={})",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate over `(x, y)` rows in order.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// A new sample containing only the rows where `keep[i]` is true.
    pub fn retain(&self, keep: &[bool]) -> Sample {
        let (x, y) = self
            .rows()
            .zip(keep.iter())
            .filter(|(_, k)| **k)
            .map(|(row, _)| row)
            .unzip();
        Sample { x, y }
    }

    /// Check the invariants the fit engine relies on.
    pub fn ensure_fittable(&self) -> Result<(), EngineError> {
        if self.len() < 2 {
            return Err(EngineError::InvalidSample(format!(
                "at least 2 data points are required, got {}",
                self.len()
            )));
        }
        if let Some(i) = self.rows().position(|(x, y)| !(x.is_finite() && y.is_finite())) {
            return Err(EngineError::InvalidSample(format!(
                "non-finite value in row {}",
                i + 1
            )));
        }
        Ok(())
    }
}

/// The closed set of model forms the engine knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Quadratic,
    Exponential,
    #[value(name = "power_law")]
    PowerLaw,
    Logarithmic,
    Sine,
}

impl ModelKind {
    /// Every kind, in default catalog order.
    pub const ALL: [ModelKind; 6] = [
        ModelKind::Linear,
        ModelKind::Quadratic,
        ModelKind::Exponential,
        ModelKind::PowerLaw,
        ModelKind::Logarithmic,
        ModelKind::Sine,
    ];

    /// Stable identifier used by catalogs and callers.
    pub fn key(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Quadratic => "quadratic",
            ModelKind::Exponential => "exponential",
            ModelKind::PowerLaw => "power_law",
            ModelKind::Logarithmic => "logarithmic",
            ModelKind::Sine => "sine",
        }
    }

    pub fn from_key(key: &str) -> Option<ModelKind> {
        let key = key.trim();
        Self::ALL.into_iter().find(|k| k.key().eq_ignore_ascii_case(key))
    }

    /// Number of fitted parameters `k`.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Linear | ModelKind::Logarithmic => 2,
            ModelKind::Quadratic | ModelKind::Exponential | ModelKind::PowerLaw => 3,
            ModelKind::Sine => 4,
        }
    }
}

/// Outlier filter applied before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
    Percentile,
    #[value(name = "isolation_forest")]
    IsolationForest,
}

impl OutlierMethod {
    /// Resolve a method name; anything unrecognised maps to `Iqr`.
    pub fn from_name(name: &str) -> OutlierMethod {
        match name.trim().to_ascii_lowercase().as_str() {
            "iqr" => OutlierMethod::Iqr,
            "zscore" | "z_score" => OutlierMethod::Zscore,
            "percentile" => OutlierMethod::Percentile,
            "isolation_forest" => OutlierMethod::IsolationForest,
            other => {
                log::debug!("unknown outlier method `{other}`, using iqr");
                OutlierMethod::Iqr
            }
        }
    }
}

/// Score multiplier granted to a good linear fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearBonus {
    /// Minimum R² for the bonus to apply (exclusive).
    pub min_r_squared: f64,
    pub factor: f64,
}

impl Default for LinearBonus {
    fn default() -> Self {
        Self {
            min_r_squared: 0.90,
            factor: 1.15,
        }
    }
}

/// Shared stop request, checked before each fit and between solver iterations.
///
/// Clones share the flag; two flags compare equal only when they are clones.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl PartialEq for CancelFlag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Tuning knobs of the fit engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// λ in `selection_score = R² · (1 − λ·k)`.
    pub complexity_penalty: f64,
    /// Function-evaluation budget per nonlinear fit.
    pub max_evaluations: usize,
    pub trend_points: usize,
    /// Fraction of the x range added on both sides of the trend curve.
    pub trend_padding: f64,
    /// Disabled by default.
    pub linear_bonus: Option<LinearBonus>,
    /// Raised by the pipeline when its deadline expires.
    #[serde(skip)]
    pub cancel: Option<CancelFlag>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            complexity_penalty: DEFAULT_COMPLEXITY_PENALTY,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            trend_points: DEFAULT_TREND_POINTS,
            trend_padding: DEFAULT_TREND_PADDING,
            linear_bonus: None,
            cancel: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.complexity_penalty.is_finite() && self.complexity_penalty >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "complexity penalty must be finite and >= 0, got {}",
                self.complexity_penalty
            )));
        }
        if self.max_evaluations == 0 {
            return Err(EngineError::InvalidConfig(
                "max evaluations must be > 0".to_string(),
            ));
        }
        if self.trend_points < 2 {
            return Err(EngineError::InvalidConfig(
                "trend curve needs at least 2 points".to_string(),
            ));
        }
        if !(self.trend_padding.is_finite() && self.trend_padding >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "trend padding must be finite and >= 0, got {}",
                self.trend_padding
            )));
        }
        if let Some(bonus) = self.linear_bonus {
            if !(bonus.factor.is_finite() && bonus.factor > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "linear bonus factor must be finite and > 0, got {}",
                    bonus.factor
                )));
            }
        }
        Ok(())
    }
}

/// Outlier settings for a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    pub params: crate::condition::ConditionParams,
}

/// What `analyze` needs besides the sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    pub engine: EngineConfig,
    /// `None` disables outlier removal.
    pub outliers: Option<OutlierConfig>,
    /// Restrict the candidate pool to these catalog keys.
    pub models: Option<Vec<String>>,
    /// Caller-level deadline for the whole selection.
    ///
    /// On expiry the running fits are cancelled at their next solver
    /// iteration; a fit already inside a closed-form solve finishes first.
    pub timeout: Option<Duration>,
}

/// Fit output for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model_key: ModelKind,
    pub name: String,
    pub params: Vec<f64>,
    /// `None` when the covariance is singular or undetermined.
    pub standard_errors: Option<Vec<f64>>,
    pub predicted: Vec<f64>,
    pub rss: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub aic: f64,
    pub selection_score: f64,
    pub param_count: usize,
    pub n: usize,
}

/// A model that did not make it into the candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub x: f64,
    pub y: f64,
}

/// Output of fitting + selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub best: FitResult,
    /// All surviving fits, descending by selection score.
    pub ranked: Vec<FitResult>,
    /// Template with fitted values substituted.
    pub equation: String,
    /// `equation` in LaTeX notation.
    pub latex: String,
    pub trend: Vec<TrendPoint>,
    pub skipped: Vec<SkippedModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInfo {
    pub original_count: usize,
    pub used_count: usize,
    pub outliers_removed: usize,
}

/// Everything a single pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub outcome: SelectionOutcome,
    /// Sample the models were fitted on (after conditioning).
    pub sample: Sample,
    /// `y - ŷ` of the winning model, row-aligned with `sample`.
    pub residuals: Vec<f64>,
    pub data_info: DataInfo,
}
