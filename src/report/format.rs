//! Terminal summaries.
//!
//! Formatting lives here so the pipeline and statistics stay free of
//! presentation concerns.

use chrono::NaiveDate;

use crate::domain::{AggregateConfig, DayEstimate, PollRecord, RaceSeries};
use crate::polls::DaySample;
use crate::stats::{Estimate, corrected_margin};

/// Per-run header plus the newest day's estimate for every race.
pub fn format_run_summary(rows: &[DayEstimate], config: &AggregateConfig) -> String {
    let mut out = String::new();

    out.push_str("=== polls - day-by-day race estimates ===\n");
    out.push_str(&format!(
        "Season: {} .. {} ({} days)\n",
        config.season_start,
        config.season_end,
        (config.season_end - config.season_start).num_days() + 1
    ));
    out.push_str(&format!(
        "Estimator: {} | min polls: {} | window: {:?} | dedup: {:?}\n",
        config.estimator.mode.label(),
        config.window.min_polls,
        config.window.policy,
        config.window.dedup,
    ));
    out.push_str(&format!("Rows: {}\n", rows.len()));

    let Some(latest) = rows.first().map(|r| r.day) else {
        out.push_str("\n(no rows)\n");
        return out;
    };

    out.push_str(&format!("\nAs of {latest}:\n"));
    out.push_str(&format!(
        "{:>3}  {:<8} {:>5} {:>8} {:>8}  {}\n",
        "#", "race", "polls", "margin", "se", "note"
    ));
    for row in rows.iter().take_while(|r| r.day == latest) {
        let note = if row.contains_assumption { "assumption" } else { "" };
        out.push_str(&format!(
            "{:>3}  {:<8} {:>5} {:>+8.1} {:>8.3}  {}\n",
            row.race_index, row.race_id, row.num_polls, row.point_estimate, row.standard_error, note
        ));
    }

    out
}

/// Detail view of a single race on a single day.
pub fn format_inspection(
    series: &RaceSeries,
    day: NaiveDate,
    sample: &DaySample,
    estimate: &Estimate,
    config: &AggregateConfig,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Race {} ({} vs {}) as of {day}\n",
        series.race_id(),
        series.info.party_a,
        series.info.party_b
    ));
    out.push_str(&format!(
        "Known polls: {} | admissible: {} real{}\n\n",
        series.polls().len(),
        sample.real_count(),
        if sample.contains_assumption { " + assumption" } else { "" }
    ));

    out.push_str(&format!(
        "{:<24} {:>10} {:>10} {:>10} {:>6} {:>8}\n",
        "pollster", "start", "end", "mid", "n", "margin"
    ));
    for poll in &sample.polls {
        out.push_str(&poll_line(poll, config));
    }

    out.push_str(&format!(
        "\n{}: {:+.2}  se: {:.4}\n",
        config.estimator.mode.label(),
        estimate.point,
        estimate.standard_error
    ));
    out
}

fn poll_line(poll: &PollRecord, config: &AggregateConfig) -> String {
    let margin = corrected_margin(poll, &config.estimator);
    let shifted = if margin != poll.margin {
        format!(" (raw {:+.1})", poll.margin)
    } else {
        String::new()
    };
    format!(
        "{:<24} {:>10} {:>10} {:>10} {:>6} {:>+8.1}{}\n",
        truncate(&poll.source_id, 24),
        poll.start_date.to_string(),
        poll.end_date.to_string(),
        poll.mid_date.to_string(),
        poll.sample_size,
        margin,
        shifted
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).chain(std::iter::once('~')).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, m, day).unwrap()
    }

    fn row(race_id: &str, race_index: usize, day: NaiveDate, assumption: bool) -> DayEstimate {
        DayEstimate {
            race_id: race_id.to_string(),
            race_index,
            day,
            num_polls: if assumption { 0 } else { 4 },
            oldest_poll_day: 250,
            point_estimate: if assumption { -4.0 } else { 2.5 },
            standard_error: 0.9,
            contains_assumption: assumption,
        }
    }

    #[test]
    fn summary_lists_only_latest_day() {
        let config = AggregateConfig::for_season(d(9, 1), d(9, 2));
        let rows = vec![
            row("NC", 1, d(9, 2), true),
            row("PA", 2, d(9, 2), false),
            row("NC", 1, d(9, 1), true),
            row("PA", 2, d(9, 1), false),
        ];
        let text = format_run_summary(&rows, &config);
        assert!(text.contains("As of 2016-09-02"));
        assert!(text.contains("(2 days)"));
        assert_eq!(text.matches("NC").count(), 1);
        assert!(text.contains("assumption"));
        assert!(text.contains("+2.5"));
    }

    #[test]
    fn empty_summary() {
        let config = AggregateConfig::for_season(d(9, 1), d(9, 2));
        assert!(format_run_summary(&[], &config).contains("(no rows)"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("Public Policy Polling", 10), "Public Po~");
        assert_eq!(truncate("PPP", 10), "PPP");
    }
}
