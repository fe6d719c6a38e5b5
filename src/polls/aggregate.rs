//! Day-by-day aggregation across a campaign season.
//!
//! The walk goes from `season_end` back to `season_start` (inclusive). Each day
//! yields one block of rows, one per race in race-id order, so consumers can
//! index rows positionally.
//!
//! Races are independent; within a day they are evaluated in parallel and
//! collected back in order.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{AggregateConfig, DayEstimate, MissingPolicy, PollRecord, RaceSeries, ordinal_day};
use crate::error::PollError;
use crate::polls::dedup::sort_newest_first;
use crate::polls::window::select;
use crate::stats::estimate;

/// The polls that fed one (race, day) estimate.
#[derive(Debug, Clone)]
pub struct DaySample {
    pub polls: Vec<PollRecord>,
    pub contains_assumption: bool,
}

impl DaySample {
    pub fn real_count(&self) -> usize {
        self.polls.iter().filter(|p| !p.is_assumption()).count()
    }
}

/// Drives window selection and estimation over a season.
///
/// Borrows the race map read-only for its whole lifetime.
pub struct Aggregator<'a> {
    races: &'a BTreeMap<String, RaceSeries>,
    config: &'a AggregateConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(races: &'a BTreeMap<String, RaceSeries>, config: &'a AggregateConfig) -> Self {
        Self { races, config }
    }

    /// Days of the season, newest first.
    pub fn season_days(&self) -> Vec<NaiveDate> {
        season_days(self.config.season_start, self.config.season_end)
    }

    /// Produce the full series: `days * races` rows, newest day first.
    ///
    /// Under [`MissingPolicy::SkipRace`] a race that cannot produce a row on
    /// some day is dropped from every day; the remaining races keep their
    /// indices.
    pub fn run(&self) -> Result<Vec<DayEstimate>, PollError> {
        let days = self.season_days();
        let mut skipped: Vec<&str> = Vec::new();

        if self.config.on_missing == MissingPolicy::SkipRace {
            for series in self.races.values() {
                if let Some(err) = days.iter().find_map(|day| self.sample(series, *day).err()) {
                    warn!(race = series.race_id(), error = %err, "skipping race");
                    skipped.push(series.race_id());
                }
            }
        }

        let indexed: Vec<(usize, &RaceSeries)> = self
            .races
            .values()
            .enumerate()
            .map(|(i, s)| (i + 1, s))
            .filter(|(_, s)| !skipped.contains(&s.race_id()))
            .collect();

        let mut out = Vec::with_capacity(days.len() * indexed.len());
        for day in days {
            debug!(day = ordinal_day(day), "processing polls");
            let block = indexed
                .par_iter()
                .map(|(index, series)| self.estimate_day(series, *index, day))
                .collect::<Result<Vec<_>, _>>()?;
            out.extend(block);
        }
        Ok(out)
    }

    /// Estimate one race on one day.
    pub fn estimate_day(
        &self,
        series: &RaceSeries,
        race_index: usize,
        day: NaiveDate,
    ) -> Result<DayEstimate, PollError> {
        let sample = self.sample(series, day)?;
        let est = estimate(&sample.polls, &self.config.estimator)?;
        let oldest_poll_day = sample
            .polls
            .iter()
            .map(|p| p.mid_date)
            .min()
            .map(ordinal_day)
            .ok_or(PollError::InsufficientData)?;

        Ok(DayEstimate {
            race_id: series.race_id().to_string(),
            race_index,
            day,
            num_polls: sample.real_count(),
            oldest_poll_day,
            point_estimate: est.point,
            standard_error: est.standard_error,
            contains_assumption: sample.contains_assumption,
        })
    }

    /// Admissible polls for `day`, topped up with a pseudo-poll when sparse.
    pub fn sample(&self, series: &RaceSeries, day: NaiveDate) -> Result<DaySample, PollError> {
        let mut polls = select(series.polls(), day, &self.config.window);
        let mut contains_assumption = false;

        if polls.len() < self.config.window.min_polls {
            match series.info.assumption {
                Some(prior) => {
                    polls.push(PollRecord::assumption(prior, self.config.assumption_date));
                    contains_assumption = true;
                }
                None if polls.is_empty() => {
                    return Err(PollError::MissingAssumption {
                        race_id: series.race_id().to_string(),
                        day,
                    });
                }
                None => {}
            }
        }

        sort_newest_first(&mut polls);
        Ok(DaySample {
            polls,
            contains_assumption,
        })
    }
}

/// Every day from `end` back to `start`, inclusive; empty if `start > end`.
pub fn season_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = end;
    while day >= start {
        days.push(day);
        day -= Duration::days(1);
    }
    days
}
