//! Error types.
//!
//! The library surfaces typed errors (`EngineError`, `FitFailure`,
//! `CatalogError`); the `pfit` binary folds them into `AppError`, which carries
//! the process exit code.

use crate::domain::ModelKind;

/// Exit code for usage, input and IO problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for a sample that cannot be analysed.
pub const EXIT_INVALID_SAMPLE: u8 = 3;
/// Exit code for "could not fit any model".
pub const EXIT_NO_MODEL: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Caller-visible outcomes of an engine invocation that are not a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The sample cannot be fitted at all (empty, mismatched, non-finite, too short).
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// Every candidate model failed or was excluded.
    #[error("Could not fit any model ({attempted} candidate(s) attempted)")]
    NoModelFitted { attempted: usize },

    /// The caller-level deadline expired before selection finished.
    ///
    /// Treated by callers exactly like `NoModelFitted`.
    #[error("Could not fit any model within {millis} ms")]
    TimedOut { millis: u64 },

    /// An engine setting is out of range.
    #[error("Invalid engine setting: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True for the "analysis failed" family (`NoModelFitted` and `TimedOut`).
    pub fn is_no_model(&self) -> bool {
        matches!(self, Self::NoModelFitted { .. } | Self::TimedOut { .. })
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::InvalidSample(_) => EXIT_INVALID_SAMPLE,
            EngineError::NoModelFitted { .. } | EngineError::TimedOut { .. } => EXIT_NO_MODEL,
            EngineError::InvalidConfig(_) => EXIT_INPUT,
        };
        AppError::new(code, err.to_string())
    }
}

/// Why a single model attempt was dropped from the candidate pool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitFailure {
    #[error("{model:?}: initial guess has length {found}, expected {expected}")]
    BadInitialGuess {
        model: ModelKind,
        expected: usize,
        found: usize,
    },

    #[error("{model:?}: objective is not finite at the initial guess")]
    NonFiniteStart { model: ModelKind },

    #[error("{model:?}: no convergence within {evaluations} function evaluations")]
    NotConverged { model: ModelKind, evaluations: usize },

    #[error("{model:?}: least-squares system is singular")]
    Singular { model: ModelKind },

    #[error("{model:?}: fitted curve is not finite on the sample")]
    NonFinitePrediction { model: ModelKind },

    #[error("{model:?}: cancelled")]
    Cancelled { model: ModelKind },

    #[error("{model:?}: R² = {r_squared} is not a usable fit")]
    PoorFit { model: ModelKind, r_squared: f64 },
}

/// Problems loading or validating a model catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog is empty")]
    Empty,

    #[error("Unknown model key `{0}` in catalog")]
    UnknownKey(String),

    #[error("Duplicate model key `{0}` in catalog")]
    DuplicateKey(String),

    #[error("Model `{key}` declares {declared} parameters but its form has {expected}")]
    ParamCount {
        key: String,
        declared: usize,
        expected: usize,
    },

    #[error("Model `{key}` initial guess has {found} values, expected {expected}")]
    InitialGuess {
        key: String,
        found: usize,
        expected: usize,
    },

    #[error("The global catalog is already initialised")]
    AlreadyInitialised,
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::new(EXIT_INPUT, err.to_string())
    }
}
