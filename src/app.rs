//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments and installs the model catalog
//! - runs the analysis pipeline
//! - prints reports/plots
//! - writes optional exports

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cli::{AnalysisArgs, Command, DemoArgs, FitArgs};
use crate::condition::ConditionParams;
use crate::data::DemoConfig;
use crate::domain::{AnalysisConfig, EngineConfig, LinearBonus, OutlierConfig};
use crate::error::AppError;
use crate::io::ingest::ColumnSpec;
use crate::models::Catalog;

pub mod pipeline;

use pipeline::{InputSource, RunConfig};

/// Environment variable naming a catalog JSON when `--catalog` is absent.
pub const CATALOG_ENV: &str = "PHYS_FIT_CATALOG";

/// Entry point for the `pfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine.
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    let catalog = install_catalog(cli.catalog)?;

    match cli.command {
        Command::Fit(args) => handle_fit(&args, catalog, OutputMode::Full),
        Command::Rank(args) => handle_fit(&args, catalog, OutputMode::RankOnly),
        Command::Demo(args) => handle_demo(&args, catalog),
        Command::Models => {
            print!("{}", crate::report::format_catalog(catalog));
            Ok(())
        }
    }
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    // Tests and embedders may already have a logger.
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}

/// Install the catalog from `--catalog`, then `$PHYS_FIT_CATALOG`, else the built-in one.
fn install_catalog(flag: Option<PathBuf>) -> Result<&'static Catalog, AppError> {
    let path = flag.or_else(|| std::env::var_os(CATALOG_ENV).map(PathBuf::from));
    match path {
        Some(path) => {
            let catalog = Catalog::from_path(&path)?;
            log::info!("loaded {} model(s) from {}", catalog.len(), path.display());
            Ok(Catalog::install(catalog)?)
        }
        None => Ok(Catalog::global()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    RankOnly,
}

fn handle_fit(args: &FitArgs, catalog: &Catalog, mode: OutputMode) -> Result<(), AppError> {
    let config = run_config_from_fit_args(args)?;
    execute(&config, catalog, mode)
}

fn handle_demo(args: &DemoArgs, catalog: &Catalog) -> Result<(), AppError> {
    let config = run_config_from_demo_args(args)?;
    execute(&config, catalog, OutputMode::Full)
}

fn execute(config: &RunConfig, catalog: &Catalog, mode: OutputMode) -> Result<(), AppError> {
    let run = pipeline::run_analysis(config, catalog)?;
    let analysis = &run.analysis;

    match mode {
        OutputMode::Full => {
            println!("{}", crate::report::format_run_summary(analysis, &run.source, config.top_n));
            if run.rows_rejected > 0 {
                println!("({} CSV row(s) rejected during ingest)", run.rows_rejected);
            }
        }
        OutputMode::RankOnly => {
            println!("{}", crate::report::format_ranking(&analysis.outcome.ranked, config.top_n));
        }
    }

    if mode == OutputMode::Full && config.plot {
        let plot = crate::plot::render_ascii_plot(
            &analysis.sample,
            &analysis.outcome.trend,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_json {
        crate::io::export::write_analysis_json(path, analysis, &run.source)?;
        log::info!("wrote {}", path.display());
    }
    if let Some(path) = &config.export_csv {
        crate::io::export::write_residuals_csv(path, analysis)?;
        log::info!("wrote {}", path.display());
    }

    Ok(())
}

pub fn run_config_from_fit_args(args: &FitArgs) -> Result<RunConfig, AppError> {
    let input = InputSource::Csv {
        path: args.file.clone(),
        columns: ColumnSpec {
            x: args.x_col.clone(),
            y: args.y_col.clone(),
        },
    };
    Ok(run_config(input, &args.analysis)?)
}

pub fn run_config_from_demo_args(args: &DemoArgs) -> Result<RunConfig, AppError> {
    let input = InputSource::Demo(DemoConfig {
        model: args.generator,
        params: args.params.clone(),
        count: args.count,
        x_min: args.x_min,
        x_max: args.x_max,
        noise: args.noise,
        spikes: args.spikes,
        seed: args.seed,
    });
    Ok(run_config(input, &args.analysis)?)
}

fn run_config(input: InputSource, args: &AnalysisArgs) -> Result<RunConfig, crate::error::EngineError> {
    let analysis = analysis_config_from_args(args);
    analysis.engine.validate()?;
    Ok(RunConfig {
        input,
        analysis,
        top_n: args.top,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        export_json: args.export_json.clone(),
        export_csv: args.export_csv.clone(),
    })
}

pub fn analysis_config_from_args(args: &AnalysisArgs) -> AnalysisConfig {
    let engine = EngineConfig {
        complexity_penalty: args.lambda,
        max_evaluations: args.max_evals,
        linear_bonus: args.linear_bonus.then(LinearBonus::default),
        ..EngineConfig::default()
    };

    let outliers = args.remove_outliers.then(|| OutlierConfig {
        method: args.outlier_method,
        params: ConditionParams::from_map(&outlier_overrides(args)),
    });

    AnalysisConfig {
        engine,
        outliers,
        models: (!args.models.is_empty()).then(|| args.models.clone()),
        timeout: args.timeout_ms.map(Duration::from_millis),
    }
}

/// Only the flags the user actually passed.
fn outlier_overrides(args: &AnalysisArgs) -> HashMap<String, f64> {
    [
        ("multiplier", args.outlier_multiplier),
        ("threshold", args.outlier_threshold),
        ("lower_percentile", args.lower_percentile),
        ("upper_percentile", args.upper_percentile),
        ("contamination", args.contamination),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
    .collect()
}
