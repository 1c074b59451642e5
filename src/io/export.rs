//! Export analysis results.
//!
//! - JSON: the full analysis (selection outcome, residuals, data info) in a
//!   small envelope with the tool name, source and a timestamp
//! - CSV: one row per used observation with fitted value and residual, easy
//!   to consume in spreadsheets or downstream scripts

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Analysis;
use crate::error::{AppError, EXIT_INPUT};

#[derive(Debug, Serialize)]
pub struct ExportEnvelope<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    #[serde(flatten)]
    pub analysis: &'a Analysis,
}

impl<'a> ExportEnvelope<'a> {
    pub fn new(analysis: &'a Analysis, source: &'a str) -> Self {
        Self {
            tool: "pfit",
            version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now(),
            source,
            analysis,
        }
    }
}

/// Write the analysis as pretty JSON.
pub fn write_analysis_json(path: &Path, analysis: &Analysis, source: &str) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &ExportEnvelope::new(analysis, source))
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write JSON: {e}")))?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct ResidualRow {
    x: f64,
    y_obs: f64,
    y_fit: f64,
    residual: f64,
}

/// Write per-observation fitted values and residuals of the winning model.
pub fn write_residuals_csv(path: &Path, analysis: &Analysis) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for row in residual_rows(analysis) {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush export CSV: {e}")))?;

    Ok(())
}

fn residual_rows(analysis: &Analysis) -> impl Iterator<Item = ResidualRow> + '_ {
    analysis
        .sample
        .rows()
        .zip(analysis.outcome.best.predicted.iter())
        .zip(analysis.residuals.iter())
        .map(|(((x, y_obs), &y_fit), &residual)| ResidualRow {
            x,
            y_obs,
            y_fit,
            residual,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataInfo, EngineConfig, Sample};
    use crate::fit::select_with;
    use crate::models::Catalog;
    use crate::report::compute_residuals;

    fn analysis() -> Analysis {
        let sample = Sample::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 3.1, 4.9, 7.0]).unwrap();
        let outcome = select_with(&sample, &Catalog::builtin(), Some(&["linear"]), &EngineConfig::default()).unwrap();
        let residuals = compute_residuals(&sample, &outcome.best);
        Analysis {
            outcome,
            residuals,
            data_info: DataInfo {
                original_count: 4,
                used_count: 4,
                outliers_removed: 0,
            },
            sample,
        }
    }

    #[test]
    fn json_envelope_keeps_outcome_field_names() {
        let a = analysis();
        let value = serde_json::to_value(ExportEnvelope::new(&a, "unit")).unwrap();
        assert_eq!(value["tool"], "pfit");
        assert_eq!(value["outcome"]["best"]["model_key"], "linear");
        assert!(value["outcome"]["best"]["r_squared"].is_number());
        assert_eq!(value["data_info"]["used_count"], 4);
        assert_eq!(value["residuals"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn residual_rows_line_up_with_sample() {
        let a = analysis();
        let rows: Vec<ResidualRow> = residual_rows(&a).collect();
        assert_eq!(rows.len(), 4);
        for r in rows {
            assert!((r.y_obs - r.y_fit - r.residual).abs() < 1e-12);
        }
    }
}
