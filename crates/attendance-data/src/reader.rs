//! Export discovery and parsing.
//!
//! Reads per-meeting attendance CSV exports from a directory and converts
//! them into [`AttendanceRecord`]s, delegating attendee resolution to the
//! caller-supplied [`IdentityResolver`].
//!
//! Discovery order is lexicographic by path and is part of the pipeline
//! contract: clustering is order-dependent, so reruns over the same
//! directory must see the same sequence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use attendance_core::error::{AttendanceError, Result};
use attendance_core::models::AttendanceRecord;
use attendance_core::roster::IdentityResolver;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ── Public types ──────────────────────────────────────────────────────────────

/// A parsed export before attendee resolution.
#[derive(Debug, Clone)]
pub struct RawExport {
    /// Export file name (the label-map join key).
    pub source: String,
    pub topic: String,
    pub start_time: NaiveDateTime,
    pub duration_minutes: u32,
    /// Raw `(attendee label, minutes attended)` rows, in file order.
    pub attendee_rows: Vec<(String, u32)>,
}

/// One export that failed fatal parsing, with the reason it was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything the ingestion stage hands to the clusterer.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Usable records, in discovery order.
    pub records: Vec<AttendanceRecord>,
    /// Raw labels that failed identity resolution, with occurrence counts.
    pub unresolved: BTreeMap<String, usize>,
    /// Exports that failed fatal parsing.
    pub skipped: Vec<SkippedFile>,
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.csv` export files recursively under `dir`, sorted by path.
///
/// Skips file names starting with `~` or `.` (editor temp files, hidden
/// files). The sorted order makes reruns reproducible.
pub fn find_export_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Exports path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "csv")
                    .unwrap_or(false)
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| !name.starts_with('~') && !name.starts_with('.'))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

// ── Export parsing ────────────────────────────────────────────────────────────

/// Parse one attendance export.
///
/// The export must carry a meeting-information header: line 1 is the info
/// column header, line 2 the info values (topic at column 1, start time at
/// column 2, duration minutes at column 5), line 3 is blank, line 4 the
/// attendee column header, and attendee rows follow (label at column 0,
/// minutes at column 2). Anything else is a [`AttendanceError::MalformedExport`],
/// fatal for this file only.
pub fn parse_export(path: &Path) -> Result<RawExport> {
    let contents = std::fs::read_to_string(path).map_err(|source| AttendanceError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let malformed = |reason: String| AttendanceError::MalformedExport {
        path: path.to_path_buf(),
        reason,
    };

    // The blank third line is the meeting-information marker; a value there
    // means the export lacks the info block entirely.
    let lines: Vec<&str> = contents.lines().collect();
    if lines.len() < 3 || !lines[2].trim().is_empty() {
        return Err(malformed(
            "export does not contain a meeting information header".to_string(),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    // The CSV reader drops the blank line, so the meeting values sit at
    // record 1 and attendee rows start at record 3.
    let info = records
        .get(1)
        .ok_or_else(|| malformed("missing meeting information row".to_string()))?;
    let topic = info
        .get(1)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing topic".to_string()))?
        .to_string();
    let duration_minutes = info
        .get(5)
        .and_then(|d| d.trim().parse::<u32>().ok())
        .ok_or_else(|| malformed("missing or invalid duration".to_string()))?;
    let start_time = parse_start_time(info.get(2).unwrap_or_default())?;

    let mut attendee_rows = Vec::new();
    for (row, record) in records.iter().enumerate().skip(3) {
        let label = record.get(0).unwrap_or_default().trim();
        if label.is_empty() {
            continue;
        }
        let minutes = record
            .get(2)
            .and_then(|m| m.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                malformed(format!("attendee row {}: missing or invalid duration", row + 1))
            })?;
        attendee_rows.push((label.to_string(), minutes));
    }

    Ok(RawExport {
        source: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        topic,
        start_time,
        duration_minutes,
        attendee_rows,
    })
}

/// Parse a locale start time such as `9/24/2020 10:13:00 AM`.
///
/// Digits are split on `/`, `:` and whitespace into month, day, year, hour,
/// minute; a `PM` marker adds 12 to hours 1–11 and `12 AM` maps to hour 0.
pub fn parse_start_time(raw: &str) -> Result<NaiveDateTime> {
    let digits = Regex::new(r"\d+").expect("regex is valid");
    let parts: Vec<u32> = digits
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if parts.len() < 5 {
        return Err(AttendanceError::TimestampParse(raw.to_string()));
    }
    let (month, day, year, minute) = (parts[0], parts[1], parts[2], parts[4]);
    let mut hour = parts[3];

    let lower = raw.to_lowercase();
    if lower.contains("pm") && hour < 12 {
        hour += 12;
    } else if lower.contains("am") && hour == 12 {
        hour = 0;
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| AttendanceError::TimestampParse(raw.to_string()))
}

// ── Record construction ───────────────────────────────────────────────────────

/// Resolve a raw export into a record plus the labels that failed resolution.
///
/// Unresolved attendees are dropped from the record (never fatal); a label
/// resolving twice in one export keeps the first row's minutes.
pub fn build_record(
    raw: RawExport,
    resolver: &dyn IdentityResolver,
) -> (AttendanceRecord, Vec<String>) {
    let mut per_attendee_duration = BTreeMap::new();
    let mut unresolved = Vec::new();

    for (label, minutes) in raw.attendee_rows {
        match resolver.resolve(&label) {
            Some(identity) => {
                per_attendee_duration.entry(identity.key()).or_insert(minutes);
            }
            None => unresolved.push(label),
        }
    }

    let record = AttendanceRecord {
        source: raw.source,
        topic: raw.topic,
        timestamp: raw.start_time,
        duration_minutes: raw.duration_minutes,
        per_attendee_duration,
    };
    (record, unresolved)
}

// ── Directory loading ─────────────────────────────────────────────────────────

/// Load every export under `dir` in deterministic (lexicographic) order.
///
/// Fatal per-file errors land in the skipped manifest and never abort the
/// run; unresolved labels are tallied across all files.
pub fn load_attendance_records(dir: &Path, resolver: &dyn IdentityResolver) -> LoadOutcome {
    let files = find_export_files(dir);
    if files.is_empty() {
        warn!("No export files found in {}", dir.display());
    }

    let mut outcome = LoadOutcome::default();
    for path in &files {
        match parse_export(path) {
            Ok(raw) => {
                let (record, misses) = build_record(raw, resolver);
                debug!(
                    "Parsed {}: {} attendees resolved, {} unresolved",
                    path.display(),
                    record.attendee_count(),
                    misses.len()
                );
                for label in misses {
                    *outcome.unresolved.entry(label).or_insert(0) += 1;
                }
                outcome.records.push(record);
            }
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                outcome.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    debug!(
        "Loaded {} records from {} files ({} skipped)",
        outcome.records.len(),
        files.len(),
        outcome.skipped.len()
    );
    outcome
}

// ── Tests ─────────────────────────────────────────────────────────────────────
