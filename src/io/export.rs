//! Series exports.
//!
//! - fixed-width row file read by the downstream numeric post-processor
//! - JSON dump of the full series for ad-hoc analysis
//!
//! Row layout (one per race per day):
//!
//! ```text
//! num_real_polls  oldest_poll_day  point  std_error  day  race_index
//! ```
//!
//! with the widths `%2d  %3d  % 5.1f  %.4f  %3d  %2d`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{AggregateConfig, DayEstimate};
use crate::error::AppError;

/// Format a single output row, newline included.
pub fn format_row(row: &DayEstimate) -> String {
    format!(
        "{:2}  {:3}  {}  {:.4}  {:3}  {:2}\n",
        row.num_polls,
        row.oldest_poll_day,
        space_signed(row.point_estimate, 5, 1),
        row.standard_error,
        row.day_ordinal(),
        row.race_index,
    )
}

/// `printf("% W.Pf")`: non-negative values get a leading space in place of a sign.
fn space_signed(value: f64, width: usize, precision: usize) -> String {
    let mut s = format!("{value:.precision$}");
    if !s.starts_with('-') {
        s.insert(0, ' ');
    }
    format!("{s:>width$}")
}

/// Write rows to any writer.
pub fn write_rows<W: Write>(mut out: W, rows: &[DayEstimate]) -> std::io::Result<()> {
    for row in rows {
        out.write_all(format_row(row).as_bytes())?;
    }
    out.flush()
}

/// Write rows to `path`, replacing any existing file.
pub fn write_rows_file(path: &Path, rows: &[DayEstimate]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create output '{}': {e}", path.display())))?;
    write_rows(BufWriter::new(file), rows)
        .map_err(|e| AppError::new(2, format!("Failed to write output '{}': {e}", path.display())))
}

/// Path for a corrected variant: `polls.median.txt` -> `polls.median.Acorrected.txt`.
pub fn variant_path(base: &Path, tag: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}.{tag}corrected.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}corrected"),
    };
    base.with_file_name(name)
}

#[derive(Debug, Serialize)]
struct SeriesFile<'a> {
    tool: &'static str,
    season_start: NaiveDate,
    season_end: NaiveDate,
    mode: &'static str,
    min_polls: usize,
    rows: &'a [DayEstimate],
}

/// Write the series as pretty JSON.
pub fn write_series_json(path: &Path, rows: &[DayEstimate], config: &AggregateConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create series JSON '{}': {e}", path.display())))?;

    let series = SeriesFile {
        tool: "polls",
        season_start: config.season_start,
        season_end: config.season_end,
        mode: config.estimator.mode.label(),
        min_polls: config.window.min_polls,
        rows,
    };

    serde_json::to_writer_pretty(BufWriter::new(file), &series)
        .map_err(|e| AppError::new(2, format!("Failed to write series JSON: {e}")))
}
