//! Thinning repeat polls from the same pollster.
//!
//! Two rules are available:
//!
//! - [`latest_per_pollster`]: keep only each pollster's most recently ended
//!   poll. This is the rule the day-by-day walk uses by default.
//! - [`drop_overlapping`]: within a pollster, drop a poll whose field period
//!   overlaps the next one's (older end > newer start), keeping the newer.
//!
//! Both return polls sorted newest mid-date first and never touch their input.

use std::collections::HashSet;

use crate::domain::{DedupRule, PollRecord};

/// Apply the configured rule.
pub fn dedup(polls: &[PollRecord], rule: DedupRule) -> Vec<PollRecord> {
    match rule {
        DedupRule::Latest => latest_per_pollster(polls),
        DedupRule::Overlap => drop_overlapping(polls),
    }
}

/// Keep the poll with the newest end date for each `source_id`.
pub fn latest_per_pollster(polls: &[PollRecord]) -> Vec<PollRecord> {
    let mut by_end: Vec<&PollRecord> = polls.iter().collect();
    by_end.sort_by(|a, b| b.end_date.cmp(&a.end_date));

    let mut seen = HashSet::new();
    let mut kept: Vec<PollRecord> = by_end
        .into_iter()
        .filter(|&p| seen.insert(p.source_id.as_str()))
        .cloned()
        .collect();
    sort_newest_first(&mut kept);
    kept
}

/// Drop a pollster's poll when its field period overlaps that pollster's next poll.
pub fn drop_overlapping(polls: &[PollRecord]) -> Vec<PollRecord> {
    if polls.len() <= 1 {
        return polls.to_vec();
    }

    let mut sorted: Vec<&PollRecord> = polls.iter().collect();
    sorted.sort_by(|a, b| {
        a.source_id
            .cmp(&b.source_id)
            .then(a.start_date.cmp(&b.start_date))
            .then(a.end_date.cmp(&b.end_date))
    });

    let mut kept: Vec<PollRecord> = Vec::with_capacity(sorted.len());
    let mut prev: Option<&PollRecord> = None;
    for poll in sorted {
        if let Some(prev) = prev {
            if prev.source_id == poll.source_id && prev.end_date > poll.start_date {
                kept.pop();
            }
        }
        kept.push(poll.clone());
        prev = Some(poll);
    }

    sort_newest_first(&mut kept);
    kept
}

/// Stable sort by descending mid-date.
pub fn sort_newest_first(polls: &mut [PollRecord]) {
    polls.sort_by(|a, b| b.mid_date.cmp(&a.mid_date));
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 9, day).unwrap()
    }

    fn poll(source: &str, start: u32, end: u32, margin: f64) -> PollRecord {
        PollRecord::new(margin, d(start), d(end), 600, source, None)
    }

    #[test]
    fn overlapping_same_pollster_keeps_newer() {
        let polls = vec![poll("PPP", 1, 10, 2.0), poll("PPP", 5, 15, 4.0)];
        let out = drop_overlapping(&polls);
        assert_eq!(out, vec![poll("PPP", 5, 15, 4.0)]);
    }

    #[test]
    fn adjacent_periods_are_not_overlapping() {
        // Older end equal to newer start is not an overlap.
        let polls = vec![poll("PPP", 1, 10, 2.0), poll("PPP", 10, 15, 4.0)];
        assert_eq!(drop_overlapping(&polls).len(), 2);
    }

    #[test]
    fn different_pollsters_never_overlap() {
        let polls = vec![poll("PPP", 1, 10, 2.0), poll("SurveyUSA", 5, 15, 4.0)];
        let out = drop_overlapping(&polls);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source_id, "SurveyUSA");
    }

    #[test]
    fn trivial_inputs_pass_through() {
        assert!(drop_overlapping(&[]).is_empty());
        let one = vec![poll("PPP", 1, 3, 1.0)];
        assert_eq!(drop_overlapping(&one), one);
        assert_eq!(latest_per_pollster(&one), one);
    }

    #[test]
    fn latest_per_pollster_keeps_newest_end() {
        let polls = vec![
            poll("PPP", 1, 4, 1.0),
            poll("Marist", 2, 6, 2.0),
            poll("PPP", 8, 12, 3.0),
            poll("Marist", 3, 5, 9.0),
        ];
        let out = latest_per_pollster(&polls);
        assert_eq!(out, vec![poll("PPP", 8, 12, 3.0), poll("Marist", 2, 6, 2.0)]);
    }

    #[test]
    fn output_is_sorted_newest_mid_date_first() {
        let polls = vec![
            poll("A", 1, 3, 1.0),
            poll("B", 10, 20, 2.0),
            poll("C", 5, 9, 3.0),
        ];
        for rule in [DedupRule::Latest, DedupRule::Overlap] {
            let out = dedup(&polls, rule);
            let mids: Vec<_> = out.iter().map(|p| p.mid_date).collect();
            assert_eq!(mids, vec![d(15), d(7), d(2)]);
        }
    }

    #[test]
    fn dedup_is_idempotent() {
        let polls = vec![
            poll("PPP", 1, 10, 1.0),
            poll("PPP", 5, 6, 2.0),
            poll("PPP", 8, 20, 3.0),
            poll("PPP", 21, 25, 4.0),
            poll("Gravis", 2, 3, 5.0),
            poll("Gravis", 3, 9, 6.0),
            poll("Emerson", 12, 14, 7.0),
        ];
        for rule in [DedupRule::Latest, DedupRule::Overlap] {
            let once = dedup(&polls, rule);
            let twice = dedup(&once, rule);
            assert_eq!(once, twice, "{rule:?} not idempotent");
        }
    }

    #[test]
    fn source_collection_is_untouched() {
        let polls = vec![poll("PPP", 1, 10, 2.0), poll("PPP", 5, 15, 4.0)];
        let before = polls.clone();
        let _ = dedup(&polls, DedupRule::Overlap);
        assert_eq!(polls, before);
    }
}
