//! Race configuration loader.
//!
//! Expected columns (header names are matched case-insensitively):
//!
//! | column | meaning |
//! |---|---|
//! | `race_id` (or `state`) | unique race key, also the output ordering key |
//! | `party_a` | first-listed candidate (positive margins favor them) |
//! | `party_b` | second-listed candidate |
//! | `assumption` | prior margin, may be blank |
//! | `url` | feed location, optional; blank / `none` means no data |
//!
//! Any problem here invalidates the whole run, so errors are returned
//! immediately with exit code 2.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::RaceInfo;
use crate::error::AppError;

const NO_DATA_SENTINELS: [&str; 4] = ["none", "n/a", "-", "no data"];

/// Load race definitions from a CSV file.
pub fn load_races(path: &Path, url_template: Option<&str>) -> Result<Vec<RaceInfo>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open races file '{}': {e}", path.display())))?;
    parse_races(file, url_template)
}

/// Parse race definitions from any CSV reader.
pub fn parse_races<R: Read>(reader: R, url_template: Option<&str>) -> Result<Vec<RaceInfo>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read races header: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let id_col = header_map
        .get("race_id")
        .or_else(|| header_map.get("state"))
        .copied()
        .ok_or_else(|| AppError::new(2, "Races file is missing a `race_id` (or `state`) column."))?;
    for required in ["party_a", "party_b"] {
        if !header_map.contains_key(required) {
            return Err(AppError::new(2, format!("Races file is missing required column `{required}`.")));
        }
    }

    let mut races = Vec::new();
    let mut seen = HashSet::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("Races file line {line}: {e}")))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let race_id = field(&record, Some(id_col)).to_string();
        if race_id.is_empty() {
            return Err(AppError::new(2, format!("Races file line {line}: empty race id.")));
        }
        if !seen.insert(race_id.clone()) {
            return Err(AppError::new(2, format!("Races file line {line}: duplicate race id `{race_id}`.")));
        }

        let party_a = field(&record, header_map.get("party_a").copied()).to_string();
        let party_b = field(&record, header_map.get("party_b").copied()).to_string();

        let raw_assumption = field(&record, header_map.get("assumption").copied());
        let assumption = if raw_assumption.is_empty() {
            None
        } else {
            let value = raw_assumption.parse::<f64>().map_err(|e| {
                AppError::new(
                    2,
                    format!("Races file line {line}: unparseable assumption `{raw_assumption}` for {race_id}: {e}"),
                )
            })?;
            if !value.is_finite() {
                return Err(AppError::new(
                    2,
                    format!("Races file line {line}: non-finite assumption for {race_id}."),
                ));
            }
            Some(value)
        };

        let raw_url = field(&record, header_map.get("url").copied());
        let url = if is_no_data(raw_url) {
            if raw_url.is_empty() {
                url_template.map(|t| expand_url_template(t, &race_id, &party_a, &party_b))
            } else {
                None
            }
        } else {
            Some(raw_url.to_string())
        };

        races.push(RaceInfo {
            race_id,
            party_a,
            party_b,
            assumption,
            url,
        });
    }

    if races.is_empty() {
        return Err(AppError::new(2, "Races file defines no races."));
    }
    Ok(races)
}

/// Fill `{race}`, `{party_a}` and `{party_b}`; values are lowercased with
/// spaces turned into `-`.
pub fn expand_url_template(template: &str, race_id: &str, party_a: &str, party_b: &str) -> String {
    let slug = |s: &str| s.trim().to_lowercase().replace(' ', "-");
    template
        .replace("{race}", &slug(race_id))
        .replace("{party_a}", &slug(party_a))
        .replace("{party_b}", &slug(party_b))
}

fn is_no_data(raw: &str) -> bool {
    raw.is_empty() || NO_DATA_SENTINELS.iter().any(|s| raw.eq_ignore_ascii_case(s))
}

fn field(record: &StringRecord, col: Option<usize>) -> &str {
    col.and_then(|c| record.get(c)).unwrap_or("").trim()
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_races_and_sentinels() {
        let csv = "\u{feff}Race_ID,party_a,party_b,assumption,url\n\
                   PA,Katie McGinty,Pat Toomey,1.5,https://example.org/pa.csv\n\
                   NV,Catherine Cortez Masto,Joe Heck,,none\n\
                   AL,Ron Crumpton,Richard Shelby,-30,\n";
        let races = parse_races(csv.as_bytes(), None).unwrap();
        assert_eq!(races.len(), 3);
        assert_eq!(races[0].race_id, "PA");
        assert_eq!(races[0].assumption, Some(1.5));
        assert_eq!(races[0].url.as_deref(), Some("https://example.org/pa.csv"));
        assert_eq!(races[1].assumption, None);
        assert_eq!(races[1].url, None);
        assert_eq!(races[2].assumption, Some(-30.0));
        assert_eq!(races[2].url, None);
    }

    #[test]
    fn blank_url_uses_template() {
        let csv = "state,party_a,party_b,assumption,url\nOH,Ted Strickland,Rob Portman,-5,\nFL,Patrick Murphy,Marco Rubio,-2,none\n";
        let races = parse_races(
            csv.as_bytes(),
            Some("https://feeds.example.org/2016-{race}-senate-{party_b}-vs-{party_a}.csv"),
        )
        .unwrap();
        assert_eq!(
            races[0].url.as_deref(),
            Some("https://feeds.example.org/2016-oh-senate-rob-portman-vs-ted-strickland.csv")
        );
        // An explicit sentinel still means no data.
        assert_eq!(races[1].url, None);
    }

    #[test]
    fn bad_assumption_is_a_config_error() {
        let csv = "race_id,party_a,party_b,assumption\nMO,Jason Kander,Roy Blunt,lean R\n";
        let err = parse_races(csv.as_bytes(), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("MO"));
    }

    #[test]
    fn duplicate_and_missing_columns_rejected() {
        let dup = "race_id,party_a,party_b\nIN,A,B\nIN,C,D\n";
        assert!(parse_races(dup.as_bytes(), None).unwrap_err().to_string().contains("duplicate"));

        let missing = "race_id,party_a\nIN,A\n";
        assert_eq!(parse_races(missing.as_bytes(), None).unwrap_err().exit_code(), 2);

        let empty = "race_id,party_a,party_b\n";
        assert_eq!(parse_races(empty.as_bytes(), None).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("races.csv");
        std::fs::write(&path, "race_id,party_a,party_b,assumption\nWI,Russ Feingold,Ron Johnson,4\n").unwrap();
        let races = load_races(&path, None).unwrap();
        assert_eq!(races[0].party_b, "Ron Johnson");

        let err = load_races(&dir.path().join("absent.csv"), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
