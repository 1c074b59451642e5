//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{Analysis, FitResult, SkippedModel};
use crate::math::stats::min_max;
use crate::models::Catalog;

const SYMBOLS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

/// Format the full run summary (sample stats + ranking + chosen model).
pub fn format_run_summary(analysis: &Analysis, source: &str, top: usize) -> String {
    let mut out = String::new();
    let info = &analysis.data_info;
    let best = &analysis.outcome.best;

    out.push_str("=== pfit - automatic model selection ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Points: n={} used (original {}, outliers removed {})\n",
        info.used_count, info.original_count, info.outliers_removed
    ));
    if let (Some((x0, x1)), Some((y0, y1))) = (min_max(analysis.sample.x()), min_max(analysis.sample.y())) {
        out.push_str(&format!("Range : x=[{x0:.4}, {x1:.4}] | y=[{y0:.4}, {y1:.4}]\n"));
    }

    out.push('\n');
    out.push_str(&format_ranking(&analysis.outcome.ranked, top));
    out.push_str(&format_skipped(&analysis.outcome.skipped));

    out.push_str("\nChosen model:\n");
    out.push_str(&format!("- {} (key={})\n", best.name, best.model_key.key()));
    out.push_str(&format!("- equation: {}\n", analysis.outcome.equation));
    out.push_str(&format!("- latex   : {}\n", analysis.outcome.latex));
    for (i, value) in best.params.iter().enumerate() {
        let symbol = SYMBOLS.get(i).copied().unwrap_or("?");
        let shown = match best.standard_errors.as_ref().and_then(|se| se.get(i)) {
            Some(&err) => format_with_uncertainty(*value, err, 2),
            None => format!("{value:.6} (no standard error)"),
        };
        out.push_str(&format!("- {symbol} = {shown}\n"));
    }
    out.push_str(&format!(
        "- R²={:.6} adjR²={:.6} AIC={:.3} RSS={:.6}\n",
        best.r_squared, best.adj_r_squared, best.aic, best.rss
    ));

    out
}

/// Ranked alternatives, best first, at most `top` rows.
pub fn format_ranking(ranked: &[FitResult], top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<16} {:>2} {:>10} {:>10} {:>12} {:>8}\n",
        "rank", "model", "k", "R²", "adj R²", "AIC", "score"
    ));
    out.push_str(&format!(
        "{:-<4} {:-<16} {:-<2} {:-<10} {:-<10} {:-<12} {:-<8}\n",
        "", "", "", "", "", "", ""
    ));

    for (i, fit) in ranked.iter().take(top.max(1)).enumerate() {
        out.push_str(
            format!(
                "{:<4} {:<16} {:>2} {:>10.6} {:>10.6} {:>12.3} {:>8.4}\n",
                i + 1,
                truncate(&fit.name, 16),
                fit.param_count,
                fit.r_squared,
                fit.adj_r_squared,
                fit.aic,
                fit.selection_score
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn format_skipped(skipped: &[SkippedModel]) -> String {
    let mut out = String::new();
    for s in skipped {
        out.push_str(&format!("  (skipped {}) {}\n", s.key, s.reason));
    }
    out
}

/// One line per catalog entry.
pub fn format_catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    for spec in catalog.specs() {
        out.push_str(&format!(
            "{:<12} k={} {:<24} {}\n",
            spec.key(),
            spec.param_count(),
            spec.equation,
            truncate(&spec.description, 60)
        ));
    }
    out
}

/// `value ± error` with the error rounded to `sig_figs` significant figures
/// and the value rounded to the same decimal place, e.g. `9.81 ± 0.12`.
pub fn format_with_uncertainty(value: f64, error: f64, sig_figs: usize) -> String {
    if !(value.is_finite() && error.is_finite()) {
        return format!("{value:.4} ± {error:.4}");
    }
    let error = error.abs();
    if error == 0.0 {
        return format!("{value:.4} ± 0");
    }

    let sig = sig_figs.max(1) as i32;
    let rounded = round_significant(error, sig);
    let decimals = (sig - 1 - rounded.log10().floor() as i32).max(0) as usize;
    format!("{value:.decimals$} ± {rounded:.decimals$}")
}

fn round_significant(v: f64, sig: i32) -> f64 {
    let magnitude = v.abs().log10().floor() as i32;
    let scale = 10f64.powi(sig - 1 - magnitude);
    (v * scale).round() / scale
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn uncertainty_matches_error_precision() {
        assert_eq!(format_with_uncertainty(9.8123, 0.1234, 2), "9.81 ± 0.12");
        assert_eq!(format_with_uncertainty(2.0, 0.0996, 2), "2.00 ± 0.10");
        assert_eq!(format_with_uncertainty(1234.4, 56.7, 2), "1234 ± 57");
        assert_eq!(format_with_uncertainty(1.5, 0.0, 2), "1.5000 ± 0");
    }

    #[test]
    fn ranking_table_respects_top() {
        let fit = |model: ModelKind, score: f64| FitResult {
            model_key: model,
            name: model.key().to_string(),
            params: vec![],
            standard_errors: None,
            predicted: vec![],
            rss: 0.0,
            r_squared: score,
            adj_r_squared: score,
            aic: -10.0,
            selection_score: score,
            param_count: model.param_count(),
            n: 5,
        };
        let table = format_ranking(&[fit(ModelKind::Linear, 0.9), fit(ModelKind::Sine, 0.8)], 1);
        assert!(table.contains("linear"));
        assert!(!table.contains("sine"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn catalog_listing_has_every_entry() {
        let listing = format_catalog(&Catalog::builtin());
        assert_eq!(listing.lines().count(), 6);
        assert!(listing.starts_with("linear"));
    }
}
