//! As-of-day poll selection.
//!
//! For a given as-of day the selector:
//!
//! 1. drops every poll that had not finished fielding (`end_date >= as_of`)
//! 2. thins repeat pollsters ([`crate::polls::dedup`])
//! 3. returns the remainder untouched if fewer than `min_polls` are left
//! 4. otherwise keeps the newest `min_polls` by mid-date (ties at the boundary
//!    included) together with a recency window (see [`WindowPolicy`])
//!
//! The result is always sorted newest mid-date first.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::{PollRecord, WindowConfig, WindowPolicy};
use crate::polls::dedup::{dedup, sort_newest_first};

/// Flat-policy recency window, measured from the newest mid-date.
pub const FLAT_LOOKBACK_DAYS: i64 = 7;

/// Select the polls that count toward `as_of`'s estimate.
pub fn select(polls: &[PollRecord], as_of: NaiveDate, config: &WindowConfig) -> Vec<PollRecord> {
    let concluded: Vec<PollRecord> = polls
        .iter()
        .filter(|p| p.end_date < as_of)
        .cloned()
        .collect();

    let mut cleaned = dedup(&concluded, config.dedup);
    sort_newest_first(&mut cleaned);

    if cleaned.len() < config.min_polls.max(1) {
        return cleaned;
    }

    match config.policy {
        WindowPolicy::Seasonal => seasonal_window(cleaned, as_of, config.min_polls),
        WindowPolicy::Flat => flat_window(cleaned, config.min_polls),
    }
}

/// Lookback used by the seasonal policy on `as_of`.
///
/// | as-of month | lookback |
/// |---|---|
/// | Jan - Jul | 42 days |
/// | Aug | 28 days |
/// | Sep | 28 days easing to 14 (one day per two calendar days) |
/// | Oct - Dec | 14 days |
pub fn seasonal_lookback(as_of: NaiveDate) -> Duration {
    let days = match as_of.month() {
        1..=7 => 42,
        8 => 28,
        9 => 28 - (as_of.day() as i64 - 1) / 2,
        _ => 14,
    };
    Duration::days(days)
}

/// Union of the top-N window and the end-date lookback from the newest poll.
///
/// `polls` must already be sorted newest mid-date first and hold at least
/// `min_polls` entries.
fn seasonal_window(polls: Vec<PollRecord>, as_of: NaiveDate, min_polls: usize) -> Vec<PollRecord> {
    let boundary = top_n_boundary(&polls, min_polls);
    let Some(newest_end) = polls.iter().map(|p| p.end_date).max() else {
        return polls;
    };
    let cutoff = newest_end - seasonal_lookback(as_of);

    polls
        .into_iter()
        .filter(|p| p.mid_date >= boundary || p.end_date >= cutoff)
        .collect()
}

/// Larger of the top-N window and the 7-day mid-date window; top-N on ties.
fn flat_window(polls: Vec<PollRecord>, min_polls: usize) -> Vec<PollRecord> {
    let boundary = top_n_boundary(&polls, min_polls);
    let newest_mid = polls[0].mid_date;
    let cutoff = newest_mid - Duration::days(FLAT_LOOKBACK_DAYS);

    let top_n = polls.iter().filter(|p| p.mid_date >= boundary).count();
    let recent = polls.iter().filter(|p| p.mid_date >= cutoff).count();

    // Both windows are prefixes of the mid-date ordering.
    let keep = top_n.max(recent);
    polls.into_iter().take(keep).collect()
}

/// Mid-date of the `min_polls`-th newest poll.
fn top_n_boundary(polls: &[PollRecord], min_polls: usize) -> NaiveDate {
    let idx = min_polls.clamp(1, polls.len()) - 1;
    polls[idx].mid_date
}
