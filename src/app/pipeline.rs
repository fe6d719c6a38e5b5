//! Shared "aggregate pipeline" logic used by both `run` and `inspect`.
//!
//! Race config -> feed fetch (parallel) -> ingest -> `RaceSeries` map -> day walk
//!
//! The subcommands then only decide what to print and where to write.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::{DirFeed, FeedConfig, FeedSource, HttpFeed};
use crate::domain::{AggregateConfig, BiasCorrection, DayEstimate, RaceInfo, RaceSeries};
use crate::error::{AppError, PollError};
use crate::io::ingest::parse_feed;
use crate::polls::Aggregator;

/// Where races and feeds are read from.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub races_path: PathBuf,
    pub feeds_dir: Option<PathBuf>,
    pub url_template: Option<String>,
    pub feed: FeedConfig,
}

/// Races with their polls, plus what went wrong while loading them.
#[derive(Debug, Clone)]
pub struct LoadedRaces {
    pub races: BTreeMap<String, RaceSeries>,
    /// Races whose feed could not be fetched or parsed; they run on their prior alone.
    pub failed_feeds: Vec<String>,
    pub row_errors: usize,
}

/// One bias-correction variant of a run.
#[derive(Debug, Clone)]
pub struct VariantRun {
    pub bias: BiasCorrection,
    pub rows: Vec<DayEstimate>,
}

/// All computed outputs of a single `polls run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub loaded: LoadedRaces,
    /// The uncorrected run comes first.
    pub variants: Vec<VariantRun>,
}

/// Read the race config without touching any feed.
pub fn read_race_config(config: &DataConfig) -> Result<Vec<RaceInfo>, AppError> {
    let infos = crate::io::races::load_races(&config.races_path, config.url_template.as_deref())?;
    info!(races = infos.len(), path = %config.races_path.display(), "loaded race config");
    Ok(infos)
}

/// Local directory when `feeds_dir` is set, HTTP otherwise.
pub fn feed_source(config: &DataConfig) -> Result<Box<dyn FeedSource>, AppError> {
    match &config.feeds_dir {
        Some(dir) => Ok(Box::new(DirFeed::new(dir))),
        None => Ok(Box::new(HttpFeed::new(config.feed)?)),
    }
}

/// Read the race config and pull every race's feed.
pub fn load_races(config: &DataConfig) -> Result<LoadedRaces, AppError> {
    let infos = read_race_config(config)?;
    let source = feed_source(config)?;
    Ok(load_from_source(infos, source.as_ref()))
}

/// Read the race config and pull only `race_id`'s feed.
///
/// An unknown id fails before any feed is fetched.
pub fn load_race(config: &DataConfig, race_id: &str) -> Result<LoadedRaces, AppError> {
    let info = read_race_config(config)?
        .into_iter()
        .find(|r| r.race_id == race_id)
        .ok_or_else(|| PollError::Config(format!("unknown race `{race_id}`")))?;
    let source = feed_source(config)?;
    Ok(load_from_source(vec![info], source.as_ref()))
}

/// Fetch and parse every race's feed in parallel.
///
/// A failed feed only costs that race its polls; the run goes on.
pub fn load_from_source(infos: Vec<RaceInfo>, source: &dyn FeedSource) -> LoadedRaces {
    let loaded: Vec<(RaceSeries, bool, usize)> = infos
        .into_par_iter()
        .map(|info| load_one(info, source))
        .collect();

    let mut races = BTreeMap::new();
    let mut failed_feeds = Vec::new();
    let mut row_errors = 0;
    for (series, failed, errors) in loaded {
        if failed {
            failed_feeds.push(series.race_id().to_string());
        }
        row_errors += errors;
        races.insert(series.race_id().to_string(), series);
    }

    LoadedRaces {
        races,
        failed_feeds,
        row_errors,
    }
}

fn load_one(info: RaceInfo, source: &dyn FeedSource) -> (RaceSeries, bool, usize) {
    let body = match source.fetch(&info) {
        Ok(Some(body)) => body,
        Ok(None) => return (RaceSeries::new(info), false, 0),
        Err(err) => {
            warn!(race = %info.race_id, error = %err, "feed failed, continuing without polls");
            return (RaceSeries::new(info), true, 0);
        }
    };

    match parse_feed(body.as_bytes(), &info) {
        Ok(ingested) => {
            for row in &ingested.row_errors {
                warn!(race = %info.race_id, line = row.line, message = %row.message, "skipping feed row");
            }
            info!(
                race = %info.race_id,
                polls = ingested.polls.len(),
                rows = ingested.rows_read,
                "parsed feed"
            );
            let errors = ingested.row_errors.len();
            (RaceSeries::with_polls(info, ingested.polls), false, errors)
        }
        Err(err) => {
            warn!(race = %info.race_id, error = %err, "feed unusable, continuing without polls");
            (RaceSeries::new(info), true, 0)
        }
    }
}

/// Aggregate once per bias variant; `BiasCorrection::None` is always run first.
pub fn run_variants(
    races: &BTreeMap<String, RaceSeries>,
    config: &AggregateConfig,
    extra: &[BiasCorrection],
) -> Result<Vec<VariantRun>, AppError> {
    let mut wanted = vec![BiasCorrection::None];
    for bias in extra {
        if !wanted.contains(bias) {
            wanted.push(*bias);
        }
    }

    wanted
        .into_iter()
        .map(|bias| {
            let mut variant = config.clone();
            variant.estimator.bias = bias;
            let rows = Aggregator::new(races, &variant).run()?;
            info!(bias = ?bias, rows = rows.len(), "aggregated");
            Ok(VariantRun { bias, rows })
        })
        .collect()
}

/// Execute the full pipeline and return the computed outputs.
pub fn run_aggregate(
    data: &DataConfig,
    config: &AggregateConfig,
    extra: &[BiasCorrection],
) -> Result<RunOutput, AppError> {
    let loaded = load_races(data)?;
    if loaded.races.is_empty() {
        return Err(AppError::new(3, "No races to aggregate."));
    }

    let variants = run_variants(&loaded.races, config, extra)?;
    if variants.first().is_none_or(|v| v.rows.is_empty()) {
        return Err(AppError::new(3, "No estimates produced (every race was skipped or the season is empty)."));
    }

    Ok(RunOutput { loaded, variants })
}
