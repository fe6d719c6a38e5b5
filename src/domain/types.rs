//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - built once at the feed-parsing boundary
//! - borrowed read-only by the day-by-day walk
//! - exported to the fixed-width row file or JSON

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Pollster identifier given to synthetic assumption polls.
pub const ASSUMPTION_SOURCE: &str = "assumption";

/// Declared partisan affiliation of a pollster (or its sponsor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Affiliation {
    PartyA,
    PartyB,
}

/// Where a poll record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// A published poll read from a feed.
    Observed,
    /// A stand-in carrying a race's prior when polling is sparse.
    Assumption,
}

/// One poll result for one race.
///
/// `margin` is in percentage points, positive when party A leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    pub margin: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mid_date: NaiveDate,
    pub sample_size: u32,
    pub source_id: String,
    pub affiliation: Option<Affiliation>,
    pub provenance: Provenance,
}

impl PollRecord {
    /// Build an observed poll; `mid_date` is derived from the field period.
    pub fn new(
        margin: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        sample_size: u32,
        source_id: impl Into<String>,
        affiliation: Option<Affiliation>,
    ) -> Self {
        Self {
            margin,
            start_date,
            end_date,
            mid_date: mid_date(start_date, end_date),
            sample_size,
            source_id: source_id.into(),
            affiliation,
            provenance: Provenance::Observed,
        }
    }

    /// A pseudo-poll standing in for the race's prior on `date`.
    pub fn assumption(prior: f64, date: NaiveDate) -> Self {
        Self {
            margin: prior,
            start_date: date,
            end_date: date,
            mid_date: date,
            sample_size: 1,
            source_id: ASSUMPTION_SOURCE.to_string(),
            affiliation: None,
            provenance: Provenance::Assumption,
        }
    }

    pub fn is_assumption(&self) -> bool {
        self.provenance == Provenance::Assumption
    }
}

/// Midpoint of a field period, truncated toward `start`.
pub fn mid_date(start: NaiveDate, end: NaiveDate) -> NaiveDate {
    let half = (end - start).num_days().div_euclid(2);
    start + chrono::Duration::days(half)
}

/// Ordinal day of year (Jan 1 = 1), the wire representation for dates.
pub fn ordinal_day(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Static configuration for one tracked race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceInfo {
    pub race_id: String,
    pub party_a: String,
    pub party_b: String,
    /// Prior margin (party A minus party B) used when polling is sparse.
    pub assumption: Option<f64>,
    /// Feed location; `None` when no data is published for the race.
    pub url: Option<String>,
}

/// All polls known for one race, plus its configuration.
///
/// The poll list is fixed once loaded; selection always produces new views.
#[derive(Debug, Clone)]
pub struct RaceSeries {
    pub info: RaceInfo,
    polls: Vec<PollRecord>,
}

impl RaceSeries {
    pub fn new(info: RaceInfo) -> Self {
        Self {
            info,
            polls: Vec::new(),
        }
    }

    pub fn with_polls(info: RaceInfo, polls: Vec<PollRecord>) -> Self {
        Self { info, polls }
    }

    pub fn polls(&self) -> &[PollRecord] {
        &self.polls
    }

    pub fn race_id(&self) -> &str {
        &self.info.race_id
    }
}

/// One output row: the estimate for one race as of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEstimate {
    pub race_id: String,
    /// 1-based position of the race in the day's block.
    pub race_index: usize,
    pub day: NaiveDate,
    /// Real polls used (the pseudo-poll is not counted).
    pub num_polls: usize,
    /// Ordinal day of the oldest poll's mid-date, pseudo-poll included.
    pub oldest_poll_day: u32,
    pub point_estimate: f64,
    pub standard_error: f64,
    pub contains_assumption: bool,
}

impl DayEstimate {
    pub fn day_ordinal(&self) -> u32 {
        ordinal_day(self.day)
    }
}

/// Central-tendency estimator used when three or more polls are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CenterMode {
    /// Median with a MAD-based standard error.
    Median,
    /// Arithmetic mean with a population-std standard error.
    Mean,
}

impl CenterMode {
    pub fn label(self) -> &'static str {
        match self {
            CenterMode::Median => "median",
            CenterMode::Mean => "mean",
        }
    }
}

/// Recency-window rule applied on each as-of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    /// Newest `min_polls` by mid-date, united with every poll ending within a
    /// lookback that shrinks as the season progresses.
    Seasonal,
    /// Newest `min_polls`, or every poll within 7 days of the newest
    /// mid-date, whichever set is larger.
    Flat,
}

/// How repeat polls from the same pollster are thinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DedupRule {
    /// Keep only the most recently ended poll per pollster.
    Latest,
    /// Drop a pollster's poll when its successor's field period overlaps it.
    Overlap,
}

/// Which partisan pollsters get their margins shifted before estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BiasCorrection {
    None,
    /// Shift party-A-affiliated polls toward party B.
    A,
    /// Shift party-B-affiliated polls toward party A.
    B,
    Both,
}

impl BiasCorrection {
    /// File-name tag for a corrected output variant.
    pub fn file_tag(self) -> Option<&'static str> {
        match self {
            BiasCorrection::None => None,
            BiasCorrection::A => Some("A"),
            BiasCorrection::B => Some("B"),
            BiasCorrection::Both => Some("both"),
        }
    }

    pub fn corrects(self, affiliation: Affiliation) -> bool {
        matches!(
            (self, affiliation),
            (BiasCorrection::A | BiasCorrection::Both, Affiliation::PartyA)
                | (BiasCorrection::B | BiasCorrection::Both, Affiliation::PartyB)
        )
    }
}

/// What to do when a race cannot produce a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Abort the whole run.
    Abort,
    /// Drop the offending race's series and keep going.
    SkipRace,
}

/// Estimator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub mode: CenterMode,
    /// Standard error reported when the only poll is the pseudo-poll.
    pub assumption_se: f64,
    /// Lower bound on the standard error of a two-poll estimate.
    pub two_poll_floor: f64,
    pub bias: BiasCorrection,
    /// Points shifted off a partisan poll's margin under `bias`.
    pub bias_amount: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            mode: CenterMode::Median,
            assumption_se: 0.05,
            two_poll_floor: 3.0,
            bias: BiasCorrection::None,
            bias_amount: 3.0,
        }
    }
}

/// Window-selection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub min_polls: usize,
    pub policy: WindowPolicy,
    pub dedup: DedupRule,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_polls: 3,
            policy: WindowPolicy::Seasonal,
            dedup: DedupRule::Latest,
        }
    }
}

/// A full aggregation run's configuration, derived from CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    pub season_start: NaiveDate,
    pub season_end: NaiveDate,
    pub window: WindowConfig,
    pub estimator: EstimatorConfig,
    /// Nominal date stamped on pseudo-polls.
    pub assumption_date: NaiveDate,
    pub on_missing: MissingPolicy,
}

impl AggregateConfig {
    /// Defaults for a season; pseudo-polls are dated Jan 1 of the season's final year.
    pub fn for_season(season_start: NaiveDate, season_end: NaiveDate) -> Self {
        let assumption_date =
            NaiveDate::from_ymd_opt(season_end.year(), 1, 1).unwrap_or(season_start);
        Self {
            season_start,
            season_end,
            window: WindowConfig::default(),
            estimator: EstimatorConfig::default(),
            assumption_date,
            on_missing: MissingPolicy::Abort,
        }
    }
}
