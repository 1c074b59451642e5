//! Shared analysis pipeline used by every CLI subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load sample -> condition (optional) -> fit/score -> select -> residuals
//!
//! The subcommands can then focus on presentation.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::condition::condition;
use crate::data::{DemoConfig, generate_sample};
use crate::domain::{Analysis, AnalysisConfig, CancelFlag, DataInfo, EngineConfig, Sample, SelectionOutcome};
use crate::error::{AppError, EngineError};
use crate::fit::select_with;
use crate::io::ingest::{ColumnSpec, load_sample};
use crate::models::Catalog;
use crate::report::compute_residuals;

/// Conditioning only runs on samples at least this large.
const MIN_ROWS_FOR_CONDITIONING: usize = 4;

/// Where the sample comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    Csv { path: PathBuf, columns: ColumnSpec },
    Demo(DemoConfig),
}

/// A full run's configuration as understood by the pipeline and the printer.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: InputSource,
    pub analysis: AnalysisConfig,
    pub top_n: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_json: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub analysis: Analysis,
    /// Human-readable description of the input.
    pub source: String,
    /// Rows dropped while reading the CSV (not outliers).
    pub rows_rejected: usize,
}

/// Load the sample for `config` and analyse it against `catalog`.
pub fn run_analysis(config: &RunConfig, catalog: &Catalog) -> Result<RunOutput, AppError> {
    let (sample, source, rows_rejected) = match &config.input {
        InputSource::Csv { path, columns } => {
            let ingest = load_sample(path, columns)?;
            let source = format!("{} ({} vs {})", path.display(), ingest.y_name, ingest.x_name);
            (ingest.sample, source, ingest.row_errors.len())
        }
        InputSource::Demo(demo) => {
            let generated = generate_sample(demo)?;
            let source = format!(
                "demo {} params={:?} noise={} seed={}",
                demo.model.key(),
                generated.params,
                demo.noise,
                demo.seed
            );
            (generated.sample, source, 0)
        }
    };

    let analysis = analyze(sample, catalog, &config.analysis)?;
    Ok(RunOutput {
        analysis,
        source,
        rows_rejected,
    })
}

/// Condition, fit, select and compute residuals.
pub fn analyze(sample: Sample, catalog: &Catalog, config: &AnalysisConfig) -> Result<Analysis, EngineError> {
    sample.ensure_fittable()?;
    config.engine.validate()?;
    let original_count = sample.len();

    let (sample, outliers_removed) = match &config.outliers {
        Some(outliers) if sample.len() >= MIN_ROWS_FOR_CONDITIONING => {
            let out = condition(&sample, outliers.method, &outliers.params);
            (out.sample, out.removed)
        }
        _ => (sample, 0),
    };
    if sample.len() < 2 {
        return Err(EngineError::InvalidSample(format!(
            "only {} point(s) left after outlier removal; at least 2 are required",
            sample.len()
        )));
    }

    let outcome = match config.timeout {
        Some(timeout) => select_with_timeout(&sample, catalog, config.models.clone(), &config.engine, timeout)?,
        None => {
            let keys = key_refs(config.models.as_deref());
            select_with(&sample, catalog, keys.as_deref(), &config.engine)?
        }
    };

    let residuals = compute_residuals(&sample, &outcome.best);
    let data_info = DataInfo {
        original_count,
        used_count: sample.len(),
        outliers_removed,
    };

    Ok(Analysis {
        outcome,
        sample,
        residuals,
        data_info,
    })
}

/// Run selection on a worker thread and give up after `timeout`.
///
/// An expired deadline yields `TimedOut` and raises the worker's cancel flag,
/// so its remaining fits stop at their next solver iteration. Its result is
/// dropped.
fn select_with_timeout(
    sample: &Sample,
    catalog: &Catalog,
    models: Option<Vec<String>>,
    engine: &EngineConfig,
    timeout: Duration,
) -> Result<SelectionOutcome, EngineError> {
    let (tx, rx) = mpsc::channel();
    let sample = sample.clone();
    let catalog = catalog.clone();
    let cancel = CancelFlag::new();
    let engine = EngineConfig {
        cancel: Some(cancel.clone()),
        ..engine.clone()
    };

    thread::spawn(move || {
        let keys = key_refs(models.as_deref());
        // The receiver may be gone after a timeout.
        let _ = tx.send(select_with(&sample, &catalog, keys.as_deref(), &engine));
    });

    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            cancel.cancel();
            log::warn!("model selection did not finish within {millis} ms");
            Err(EngineError::TimedOut { millis })
        }
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::NoModelFitted { attempted: 0 }),
    }
}

fn key_refs(models: Option<&[String]>) -> Option<Vec<&str>> {
    models.map(|keys| keys.iter().map(String::as_str).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionParams;
    use crate::domain::{ModelKind, OutlierConfig, OutlierMethod};

    fn iqr() -> Option<OutlierConfig> {
        Some(OutlierConfig {
            method: OutlierMethod::Iqr,
            params: ConditionParams::default(),
        })
    }

    #[test]
    fn analyze_reports_data_info_after_outlier_removal() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        y[5] = 500.0;
        let sample = Sample::new(x, y).unwrap();
        let config = AnalysisConfig {
            outliers: iqr(),
            ..AnalysisConfig::default()
        };

        let a = analyze(sample, &Catalog::builtin(), &config).unwrap();
        assert_eq!(
            a.data_info,
            DataInfo {
                original_count: 10,
                used_count: 9,
                outliers_removed: 1
            }
        );
        assert_eq!(a.outcome.best.model_key, ModelKind::Linear);
        assert_eq!(a.residuals.len(), 9);
        assert!(a.residuals.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn small_samples_skip_conditioning() {
        let sample = Sample::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 100.0]).unwrap();
        let config = AnalysisConfig {
            outliers: iqr(),
            ..AnalysisConfig::default()
        };
        let a = analyze(sample, &Catalog::builtin(), &config).unwrap();
        assert_eq!(a.data_info.outliers_removed, 0);
        assert_eq!(a.data_info.used_count, 3);
    }

    #[test]
    fn isolation_forest_on_extreme_values_does_not_abort() {
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        y[2] = 1.7e308;
        y[9] = -1.7e308;
        let config = AnalysisConfig {
            outliers: Some(OutlierConfig {
                method: OutlierMethod::IsolationForest,
                params: ConditionParams::default(),
            }),
            ..AnalysisConfig::default()
        };
        match analyze(Sample::new(x, y).unwrap(), &Catalog::builtin(), &config) {
            Ok(a) => assert_eq!(a.data_info.used_count + a.data_info.outliers_removed, 12),
            Err(e) => assert!(e.is_no_model(), "{e}"),
        }
    }

    #[test]
    fn single_point_is_invalid() {
        let sample = Sample::new(vec![1.0], vec![2.0]).unwrap();
        let err = analyze(sample, &Catalog::builtin(), &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSample(_)));
    }

    #[test]
    fn generous_timeout_returns_the_same_outcome() {
        let x: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let sample = Sample::new(x, y).unwrap();

        let plain = analyze(sample.clone(), &Catalog::builtin(), &AnalysisConfig::default()).unwrap();
        let timed = analyze(
            sample,
            &Catalog::builtin(),
            &AnalysisConfig {
                timeout: Some(Duration::from_secs(60)),
                ..AnalysisConfig::default()
            },
        )
        .unwrap();
        assert_eq!(plain.outcome, timed.outcome);
    }

    #[test]
    fn zero_timeout_is_treated_as_no_model() {
        let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().map(|v| (1.3 * v).sin() + 0.1 * v).collect();
        let sample = Sample::new(x, y).unwrap();
        let config = AnalysisConfig {
            timeout: Some(Duration::ZERO),
            ..AnalysisConfig::default()
        };
        match analyze(sample, &Catalog::builtin(), &config) {
            Err(e) => assert!(e.is_no_model()),
            // The worker can win the race on a fast machine.
            Ok(a) => assert!(a.outcome.best.r_squared > 0.0),
        }
    }

    #[test]
    fn restricting_models_limits_the_ranking() {
        let x: Vec<f64> = (1..15).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v.ln() + 1.0).collect();
        let sample = Sample::new(x, y).unwrap();
        let config = AnalysisConfig {
            models: Some(vec!["logarithmic".to_string(), "linear".to_string()]),
            ..AnalysisConfig::default()
        };
        let a = analyze(sample, &Catalog::builtin(), &config).unwrap();
        assert_eq!(a.outcome.ranked.len(), 2);
        assert_eq!(a.outcome.best.model_key, ModelKind::Logarithmic);
    }
}
