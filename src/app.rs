//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - turns them into pipeline configuration
//! - prints summaries and writes the output files

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{AggregateArgs, Command, DataArgs, InspectArgs, RunArgs};
use crate::data::FeedConfig;
use crate::domain::{AggregateConfig, EstimatorConfig, WindowConfig};
use crate::error::{AppError, PollError};

pub mod pipeline;

use pipeline::DataConfig;

/// Entry point for the `polls` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let data = data_config_from_args(&args.data)?;
    let config = aggregate_config_from_args(&args.aggregate, today())?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("polls.{}.txt", config.estimator.mode.label())));

    let run = pipeline::run_aggregate(&data, &config, &args.bias_correction)?;
    write_outputs(&run, &output, args.export_json.as_deref(), &config)?;

    if !args.quiet {
        if let Some(plain) = run.variants.first() {
            println!("{}", crate::report::format_run_summary(&plain.rows, &config));
        }
        if !run.loaded.failed_feeds.is_empty() {
            println!("Feeds unavailable: {}", run.loaded.failed_feeds.join(", "));
        }
    }

    Ok(())
}

/// Write the row file of every variant plus the optional JSON export; returns
/// the paths written.
fn write_outputs(
    run: &pipeline::RunOutput,
    output: &Path,
    export_json: Option<&Path>,
    config: &AggregateConfig,
) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::new();
    for variant in &run.variants {
        let path = match variant.bias.file_tag() {
            Some(tag) => crate::io::export::variant_path(output, tag),
            None => output.to_path_buf(),
        };
        crate::io::export::write_rows_file(&path, &variant.rows)?;
        info!(path = %path.display(), rows = variant.rows.len(), "wrote estimates");
        written.push(path);
    }

    if let (Some(path), Some(plain)) = (export_json, run.variants.first()) {
        crate::io::export::write_series_json(path, &plain.rows, config)?;
        info!(path = %path.display(), "wrote JSON export");
        written.push(path.to_path_buf());
    }
    Ok(written)
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let data = data_config_from_args(&args.data)?;
    let mut config = aggregate_config_from_args(&args.aggregate, today())?;
    config.estimator.bias = args.bias_correction;
    let day = args.day.unwrap_or(config.season_end);

    let loaded = pipeline::load_race(&data, &args.race)?;
    let series = loaded
        .races
        .get(&args.race)
        .ok_or_else(|| PollError::Config(format!("unknown race `{}`", args.race)))?;

    let aggregator = crate::polls::Aggregator::new(&loaded.races, &config);
    let sample = aggregator.sample(series, day)?;
    let estimate = crate::stats::estimate(&sample.polls, &config.estimator)?;

    println!(
        "{}",
        crate::report::format_inspection(series, day, &sample, &estimate, &config)
    );
    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn data_config_from_args(args: &DataArgs) -> Result<DataConfig, AppError> {
    if args.timeout_secs == 0 {
        return Err(PollError::Config("--timeout-secs must be at least 1".to_string()).into());
    }
    Ok(DataConfig {
        races_path: args.races.clone(),
        feeds_dir: args.feeds_dir.clone(),
        url_template: args.url_template.clone(),
        feed: FeedConfig {
            timeout: Duration::from_secs(args.timeout_secs),
            retries: args.retries,
            ..FeedConfig::default()
        },
    })
}

/// Build and validate the aggregation config; `today` fills a missing season end.
pub fn aggregate_config_from_args(args: &AggregateArgs, today: NaiveDate) -> Result<AggregateConfig, AppError> {
    let season_end = args.season_end.unwrap_or(today);
    let season_start = match args.season_start {
        Some(start) => start,
        None => NaiveDate::from_ymd_opt(season_end.year(), 3, 1)
            .ok_or_else(|| PollError::Config("cannot derive a default season start".to_string()))?,
    };

    if season_start > season_end {
        return Err(PollError::Config(format!("season start {season_start} is after season end {season_end}")).into());
    }
    if args.min_polls == 0 {
        return Err(PollError::Config("--min-polls must be at least 1".to_string()).into());
    }
    for (name, value) in [
        ("--assumption-se", args.assumption_se),
        ("--two-poll-floor", args.two_poll_floor),
        ("--bias-amount", args.bias_amount),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(PollError::Config(format!("{name} must be a non-negative number")).into());
        }
    }

    let mut config = AggregateConfig::for_season(season_start, season_end);
    config.window = WindowConfig {
        min_polls: args.min_polls,
        policy: args.window,
        dedup: args.dedup,
    };
    config.estimator = EstimatorConfig {
        mode: args.mode,
        assumption_se: args.assumption_se,
        two_poll_floor: args.two_poll_floor,
        bias_amount: args.bias_amount,
        ..EstimatorConfig::default()
    };
    config.on_missing = args.on_missing;
    Ok(config)
}

/// Rewrite argv so `polls` defaults to `polls run`.
///
/// Rules:
/// - `polls`                          -> `polls run`
/// - `polls --races x.csv ...`        -> `polls run --races x.csv ...`
/// - `polls --help/--version/-h`      -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    if matches!(arg1.as_str(), "run" | "inspect") {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}
