//! CSV ingest.
//!
//! Turns a CSV with a header row into an `(x, y)` sample.
//!
//! Design goals:
//! - **Strict schema** for the selected columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no conditioning or fitting here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::Sample;
use crate::error::{AppError, EXIT_INPUT, EXIT_INVALID_SAMPLE};

/// Which CSV columns hold `x` and `y`.
///
/// `None` means: a column named `x` (or `y`) if present, otherwise the first
/// (or second) column.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    pub x: Option<String>,
    pub y: Option<String>,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the sample + resolved column names + row errors.
#[derive(Debug, Clone)]
pub struct IngestedSample {
    pub sample: Sample,
    pub x_name: String,
    pub y_name: String,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a sample from a CSV file.
pub fn load_sample(path: &Path, columns: &ColumnSpec) -> Result<IngestedSample, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_sample(file, columns)
}

/// Load a sample from any CSV reader.
pub fn read_sample<R: Read>(input: R, columns: &ColumnSpec) -> Result<IngestedSample, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let x_idx = resolve_column(columns.x.as_deref(), "x", 0, &header_map, headers.len())?;
    let y_idx = resolve_column(columns.y.as_deref(), "y", 1, &header_map, headers.len())?;
    if x_idx == y_idx {
        return Err(AppError::new(EXIT_INPUT, "x and y must be different columns."));
    }

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        match (parse_field(&record, x_idx), parse_field(&record, y_idx)) {
            (Ok(x), Ok(y)) => {
                xs.push(x);
                ys.push(y);
            }
            (Err(message), _) | (_, Err(message)) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        log::warn!("{} row(s) skipped during ingest", row_errors.len());
    }
    if xs.is_empty() {
        return Err(AppError::new(EXIT_INVALID_SAMPLE, "No valid rows in CSV."));
    }

    let sample = Sample::new(xs, ys)?;
    Ok(IngestedSample {
        sample,
        x_name: headers.get(x_idx).unwrap_or("x").to_string(),
        y_name: headers.get(y_idx).unwrap_or("y").to_string(),
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header; strip it so lookups by name still work.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_column(
    requested: Option<&str>,
    default_name: &str,
    default_idx: usize,
    header_map: &HashMap<String, usize>,
    n_columns: usize,
) -> Result<usize, AppError> {
    if let Some(name) = requested {
        return header_map
            .get(&normalize_header_name(name))
            .copied()
            .ok_or_else(|| AppError::new(EXIT_INPUT, format!("Missing column: `{name}`")));
    }
    if let Some(&idx) = header_map.get(default_name) {
        return Ok(idx);
    }
    if default_idx < n_columns {
        return Ok(default_idx);
    }
    Err(AppError::new(
        EXIT_INPUT,
        format!("CSV needs at least two columns (found {n_columns})."),
    ))
}

fn parse_field(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = record.get(idx).ok_or_else(|| format!("missing field {}", idx + 1))?;
    let value: f64 = raw.parse().map_err(|_| format!("not a number: `{raw}`"))?;
    if !value.is_finite() {
        return Err(format!("non-finite value: `{raw}`"));
    }
    Ok(value)
}
