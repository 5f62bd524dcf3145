//! Output formatting and persistence for scores and analytics results.
//!
//! Supports pretty JSON logging, letter grades, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::models::ScoreRecord;

/// Converts a normalized value (0.0–1.0) into a letter grade.
///
/// | Range       | Grade |
/// |-------------|-------|
/// | >= 0.95     | A+    |
/// | >= 0.90     | A     |
/// | >= 0.80     | B     |
/// | >= 0.65     | C     |
/// | >= 0.40     | D     |
/// | < 0.40      | F     |
pub fn grade(p: f64) -> String {
    match p {
        p if p >= 0.95 => "A+".into(),
        p if p >= 0.90 => "A".into(),
        p if p >= 0.80 => "B".into(),
        p if p >= 0.65 => "C".into(),
        p if p >= 0.40 => "D".into(),
        _ => "F".into(),
    }
}

/// Grade of a composite score; `overall` is on a 0–5 scale.
pub fn score_grade(record: &ScoreRecord) -> String {
    grade(record.overall / 5.0)
}

/// Grade of a 0–100 efficiency score.
pub fn efficiency_grade(efficiency_score: f64) -> String {
    grade(efficiency_score / 100.0)
}

/// One CSV row per score record.
#[derive(Debug, Serialize)]
struct ScoreRow<'a> {
    route_id: &'a str,
    reliability: f64,
    safety: f64,
    punctuality: f64,
    comfort: f64,
    overall: f64,
    grade: String,
    total_reports: usize,
    last_calculated: DateTime<Utc>,
}

impl<'a> From<&'a ScoreRecord> for ScoreRow<'a> {
    fn from(r: &'a ScoreRecord) -> Self {
        Self {
            route_id: &r.route_id,
            reliability: r.reliability,
            safety: r.safety,
            punctuality: r.punctuality,
            comfort: r.comfort,
            overall: r.overall,
            grade: score_grade(r),
            total_reports: r.total_reports,
            last_calculated: r.last_calculated,
        }
    }
}

/// Logs any result as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends score records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_scores(path: &str, records: &[ScoreRecord]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending score rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for record in records {
        writer.serialize(ScoreRow::from(record))?;
    }
    writer.flush()?;

    Ok(())
}
