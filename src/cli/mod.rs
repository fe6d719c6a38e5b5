//! Command-line parsing for the poll aggregator.
//!
//! Argument parsing and command dispatch stay separate from the statistics
//! code; `app` turns these structs into run configuration.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{BiasCorrection, CenterMode, DedupRule, MissingPolicy, WindowPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "polls", version, about = "Day-by-day robust poll aggregation per race")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch feeds, walk the season and write the estimate series.
    Run(RunArgs),
    /// Show the polls and estimate behind one race on one day.
    Inspect(InspectArgs),
}

/// Where race definitions and poll feeds come from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Race definitions CSV (race_id, party_a, party_b, assumption, url).
    #[arg(short = 'r', long, env = "POLLS_RACES", default_value = "races.csv")]
    pub races: PathBuf,

    /// Read feeds from `<DIR>/<race_id>.csv` instead of fetching URLs.
    #[arg(long, env = "POLLS_FEEDS_DIR")]
    pub feeds_dir: Option<PathBuf>,

    /// Feed URL used when a race row leaves `url` blank.
    /// Placeholders: {race}, {party_a}, {party_b}.
    #[arg(long, env = "POLLS_URL_TEMPLATE")]
    pub url_template: Option<String>,

    /// Per-request timeout (seconds).
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,

    /// Extra attempts after a transient fetch failure.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
}

/// Season and estimator settings.
#[derive(Debug, Args, Clone)]
pub struct AggregateArgs {
    /// First day of the season (default: March 1 of the season-end year).
    #[arg(long)]
    pub season_start: Option<NaiveDate>,

    /// Last day of the season (default: today).
    #[arg(long)]
    pub season_end: Option<NaiveDate>,

    /// Polls wanted per race per day before a pseudo-poll is added.
    #[arg(long, default_value_t = 3)]
    pub min_polls: usize,

    /// Central estimator for three or more polls.
    #[arg(long, value_enum, default_value_t = CenterMode::Median)]
    pub mode: CenterMode,

    /// Recency-window policy.
    #[arg(long, value_enum, default_value_t = WindowPolicy::Seasonal)]
    pub window: WindowPolicy,

    /// Repeat-pollster rule.
    #[arg(long, value_enum, default_value_t = DedupRule::Latest)]
    pub dedup: DedupRule,

    /// Standard error reported when only the pseudo-poll is available.
    #[arg(long, default_value_t = 0.05)]
    pub assumption_se: f64,

    /// Minimum standard error of a two-poll estimate.
    #[arg(long, default_value_t = 3.0)]
    pub two_poll_floor: f64,

    /// Points shifted off partisan polls when bias correction is on.
    #[arg(long, default_value_t = 3.0)]
    pub bias_amount: f64,

    /// What to do when a race has no polls and no assumption.
    #[arg(long, value_enum, default_value_t = MissingPolicy::Abort)]
    pub on_missing: MissingPolicy,
}

/// Options for `polls run`.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub aggregate: AggregateArgs,

    /// Also write bias-corrected variants (comma separated: a,b,both).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub bias_correction: Vec<BiasCorrection>,

    /// Output row file (default: polls.<mode>.txt).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Also export the series as JSON.
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Do not print the summary table.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Options for `polls inspect`.
#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub aggregate: AggregateArgs,

    /// Race to inspect.
    #[arg(long)]
    pub race: String,

    /// As-of day (default: season end).
    #[arg(long)]
    pub day: Option<NaiveDate>,

    /// Bias correction applied to the shown estimate.
    #[arg(long, value_enum, default_value_t = BiasCorrection::None)]
    pub bias_correction: BiasCorrection,
}
