//! Feed CSV ingest and normalization.
//!
//! Turns one race's raw poll feed into `PollRecord`s:
//!
//! - columns are located by header name, so column order may vary
//! - margin is `party A share - party B share`, read from the candidates'
//!   columns, or from a `margin` / `difference` column when those are absent
//! - pollster names are trimmed of sponsor/partner suffixes, and a `(D` or
//!   `(R` marker becomes the poll's affiliation (party A / party B)
//!
//! Bad rows are skipped and reported; only an unusable header fails the feed.

use std::collections::HashMap;
use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::domain::{Affiliation, PollRecord, RaceInfo};
use crate::error::PollError;
use crate::io::races::build_header_map;

const POLLSTER_COLUMNS: [&str; 3] = ["pollster", "source", "source_id"];
const START_COLUMNS: [&str; 2] = ["start date", "start_date"];
const END_COLUMNS: [&str; 2] = ["end date", "end_date"];
const SAMPLE_COLUMNS: [&str; 4] = ["number of observations", "sample_size", "observations", "n"];
const MARGIN_COLUMNS: [&str; 2] = ["margin", "difference"];

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output for one feed.
#[derive(Debug, Clone)]
pub struct IngestedPolls {
    pub polls: Vec<PollRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// How the margin is read from each row.
#[derive(Debug, Clone, Copy)]
enum MarginSource {
    Candidates { a: usize, b: usize },
    Column(usize),
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    pollster: usize,
    start: usize,
    end: usize,
    sample: usize,
    margin: MarginSource,
}

/// Parse a feed for `race`.
pub fn parse_feed<R: Read>(reader: R, race: &RaceInfo) -> Result<IngestedPolls, PollError> {
    let feed_err = |message: String| PollError::Feed {
        race_id: race.race_id.clone(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| feed_err(format!("unreadable header: {e}")))?
        .clone();
    let columns = resolve_columns(&build_header_map(&headers), race).map_err(feed_err)?;

    let mut polls = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &columns));
        match parsed {
            Ok(poll) => polls.push(poll),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(IngestedPolls {
        polls,
        row_errors,
        rows_read,
    })
}

fn resolve_columns(header_map: &HashMap<String, usize>, race: &RaceInfo) -> Result<Columns, String> {
    let find = |names: &[&str]| names.iter().find_map(|n| header_map.get(*n).copied());
    let require = |names: &[&str], what: &str| find(names).ok_or_else(|| format!("missing {what} column"));

    let pollster = require(&POLLSTER_COLUMNS, "pollster")?;
    let start = require(&START_COLUMNS, "start date")?;
    let end = require(&END_COLUMNS, "end date")?;
    let sample = require(&SAMPLE_COLUMNS, "sample size")?;

    let margin = match (
        candidate_column(header_map, &race.party_a),
        candidate_column(header_map, &race.party_b),
    ) {
        (Some(a), Some(b)) if a != b => MarginSource::Candidates { a, b },
        _ => find(&MARGIN_COLUMNS).map(MarginSource::Column).ok_or_else(|| {
            format!(
                "no columns for `{}` / `{}` and no margin column",
                race.party_a, race.party_b
            )
        })?,
    };

    Ok(Columns {
        pollster,
        start,
        end,
        sample,
        margin,
    })
}

/// Column holding a candidate's share: full name, first token, then last token.
fn candidate_column(header_map: &HashMap<String, usize>, name: &str) -> Option<usize> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = name.split_whitespace().collect();
    [Some(name.as_str()), tokens.first().copied(), tokens.last().copied()]
        .into_iter()
        .flatten()
        .find_map(|key| header_map.get(key).copied())
}

fn parse_row(record: &StringRecord, cols: &Columns) -> Result<PollRecord, String> {
    let get = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

    let (source_id, affiliation) = normalize_pollster(get(cols.pollster));
    if source_id.is_empty() {
        return Err("empty pollster".to_string());
    }

    let start = parse_date(get(cols.start))?;
    let end = parse_date(get(cols.end))?;
    if start > end {
        return Err(format!("start date {start} after end date {end}"));
    }

    let sample_size = parse_sample_size(get(cols.sample))?;

    let margin = match cols.margin {
        MarginSource::Candidates { a, b } => parse_number(get(a), "party A share")? - parse_number(get(b), "party B share")?,
        MarginSource::Column(idx) => parse_number(get(idx), "margin")?,
    };

    Ok(PollRecord::new(margin, start, end, sample_size, source_id, affiliation))
}

/// Strip sponsor and partner suffixes; a `(D` / `(R` marker sets the affiliation.
///
/// `"PPP (D-Senate Majority PAC)/Fox"` becomes `("PPP", Some(PartyA))`.
pub fn normalize_pollster(raw: &str) -> (String, Option<Affiliation>) {
    let affiliation = if raw.contains("(D") {
        Some(Affiliation::PartyA)
    } else if raw.contains("(R") {
        Some(Affiliation::PartyB)
    } else {
        None
    };
    let name = raw
        .split('(')
        .next()
        .unwrap_or("")
        .split('/')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    (name, affiliation)
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DDTHH:MM:SSZ`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    Err(format!("invalid date `{raw}`"))
}

fn parse_number(raw: &str, what: &str) -> Result<f64, String> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("invalid {what} `{raw}`"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("non-finite {what}"))
    }
}

fn parse_sample_size(raw: &str) -> Result<u32, String> {
    if raw.is_empty() {
        return Err("missing sample size".to_string());
    }
    let value = parse_number(raw, "sample size")?.round();
    if value < 1.0 || value > f64::from(u32::MAX) {
        return Err(format!("sample size must be positive, got `{raw}`"));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race() -> RaceInfo {
        RaceInfo {
            race_id: "NH".to_string(),
            party_a: "Maggie Hassan".to_string(),
            party_b: "Kelly Ayotte".to_string(),
            assumption: Some(0.0),
            url: None,
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, m, day).unwrap()
    }

    #[test]
    fn parses_candidate_columns() {
        let csv = "Pollster,Start Date,End Date,Entry Date/Time (ET),Number of Observations,Population,Mode,Hassan,Ayotte,Undecided \n\
                   WMUR/UNH,2016-09-27,2016-10-02,2016-10-03T14:00:00Z,770,Likely Voters,Live Phone,45,47,5\n\
                   PPP (D-End Citizens United),2016-09-27,2016-09-28,2016-09-30T10:00:00Z,737,Likely Voters,IVR/Online,46,44,10\n\
                   Emerson College,2016-10-17,2016-10-19 00:00:00,2016-10-20,600,Likely Voters,IVR,44.5,43,8\n";
        let out = parse_feed(csv.as_bytes(), &race()).unwrap();
        assert_eq!(out.rows_read, 3);
        assert!(out.row_errors.is_empty(), "{:?}", out.row_errors);
        assert_eq!(out.polls.len(), 3);

        let unh = &out.polls[0];
        assert_eq!(unh.source_id, "WMUR");
        assert_eq!(unh.margin, -2.0);
        assert_eq!(unh.sample_size, 770);
        assert_eq!(unh.mid_date, d(9, 29));
        assert_eq!(unh.affiliation, None);

        let ppp = &out.polls[1];
        assert_eq!(ppp.source_id, "PPP");
        assert_eq!(ppp.affiliation, Some(Affiliation::PartyA));
        assert_eq!(ppp.margin, 2.0);

        assert_eq!(out.polls[2].end_date, d(10, 19));
        assert_eq!(out.polls[2].margin, 1.5);
    }

    #[test]
    fn candidate_columns_by_full_name_and_first_name() {
        // "Maggie Hassan" matches by full name, "Kelly" by Ayotte's first name;
        // both win over the margin column.
        let csv = "Pollster,Start Date,End Date,Number of Observations,Maggie Hassan,Kelly,Margin\n\
                   UMass Lowell,2016-10-07,2016-10-11,517,42,44,99\n";
        let out = parse_feed(csv.as_bytes(), &race()).unwrap();
        assert!(out.row_errors.is_empty(), "{:?}", out.row_errors);
        assert_eq!(out.polls.len(), 1);
        assert_eq!(out.polls[0].margin, -2.0);
    }

    #[test]
    fn malformed_rows_are_skipped_with_diagnostics() {
        let csv = "pollster,start_date,end_date,sample_size,margin\n\
                   Gravis,2016-10-01,2016-10-03,1000,3\n\
                   Gravis,2016-10-05,2016-10-04,1000,3\n\
                   Monmouth,10/01/2016,2016-10-03,400,1\n\
                   Marist,2016-10-01,2016-10-03,,2\n\
                   Suffolk,2016-10-01,2016-10-03,500,n/a\n\
                   ,2016-10-01,2016-10-03,500,1\n";
        let out = parse_feed(csv.as_bytes(), &race()).unwrap();
        assert_eq!(out.rows_read, 6);
        assert_eq!(out.polls.len(), 1);
        let lines: Vec<_> = out.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn unusable_header_fails_the_feed() {
        let csv = "pollster,start_date,end_date,sample_size\nA,2016-10-01,2016-10-03,500\n";
        let err = parse_feed(csv.as_bytes(), &race()).unwrap_err();
        assert!(matches!(err, PollError::Feed { ref race_id, .. } if race_id == "NH"));
    }

    #[test]
    fn pollster_normalization() {
        assert_eq!(normalize_pollster("Remington (R)/Axiom"), ("Remington".to_string(), Some(Affiliation::PartyB)));
        assert_eq!(normalize_pollster(" SurveyUSA "), ("SurveyUSA".to_string(), None));
        assert_eq!(normalize_pollster("Ipsos/Reuters"), ("Ipsos".to_string(), None));
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2016-04-06").unwrap(), d(4, 6));
        assert_eq!(parse_date("2016-04-06 13:45:00").unwrap(), d(4, 6));
        assert_eq!(parse_date("2016-04-06T13:45:00Z").unwrap(), d(4, 6));
        assert!(parse_date("April 6").is_err());
    }
}
