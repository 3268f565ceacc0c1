//! Roster loading and identity resolution.
//!
//! The roster is an explicitly constructed, owned value handed to the
//! resolver at construction time. Resolution here is exact (normalized
//! full-name lookup); anything fuzzier is an external implementation of
//! [`IdentityResolver`].

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{AttendanceError, Result};
use crate::models::{normalize_attendee_label, AttendeeIdentity, IdentityKey};

// ── Roster ────────────────────────────────────────────────────────────────────

/// All known people, keyed by canonical identity.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: BTreeMap<IdentityKey, AttendeeIdentity>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity, replacing any previous entry under the same key.
    pub fn insert(&mut self, identity: AttendeeIdentity) {
        self.students.insert(identity.key(), identity);
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&AttendeeIdentity> {
        self.students.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttendeeIdentity> {
        self.students.values()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Load every homeroom CSV file under `dir` (non-recursively), sorted by
    /// file name for deterministic precedence.
    ///
    /// Files whose names start with `~` or `.` are skipped, as are non-CSV
    /// files. A malformed homeroom file is fatal: the run cannot start
    /// without a usable roster.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|source| AttendanceError::FileRead {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().map(|ext| ext == "csv").unwrap_or(false)
                    && !path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with('~') || n.starts_with('.'))
                        .unwrap_or(true)
            })
            .collect();
        paths.sort();

        let mut roster = Roster::new();
        for path in &paths {
            for identity in load_homeroom_file(path)? {
                roster.insert(identity);
            }
        }

        if roster.is_empty() {
            warn!("No roster members loaded from {}", dir.display());
        }
        Ok(roster)
    }
}

// ── Homeroom file parsing ─────────────────────────────────────────────────────

/// Extract `(grade_level, teacher)` from a homeroom file name.
///
/// Homeroom files are named `h<grade><Teacher>.csv`, e.g. `h6Smith.csv`.
fn parse_homeroom_name(path: &Path) -> Result<(u8, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut chars = stem.chars();
    let _prefix = chars.next();
    let grade = chars.next().and_then(|c| c.to_digit(10));
    let teacher: String = chars.collect();

    match grade {
        Some(g) if !teacher.is_empty() => Ok((g as u8, teacher)),
        _ => Err(AttendanceError::Roster {
            path: path.to_path_buf(),
            reason: "file name must look like h<grade><Teacher>.csv".to_string(),
        }),
    }
}

/// Parse one homeroom CSV into identities.
///
/// The file must contain a header row with `ID` and `Name` columns; names
/// are inverted (`Last, First`). Rows without an invertible name are skipped
/// with a warning.
fn load_homeroom_file(path: &Path) -> Result<Vec<AttendeeIdentity>> {
    let (grade_level, teacher) = parse_homeroom_name(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    // Locate the ID and Name columns.
    let mut header = None;
    for (row, record) in records.iter().enumerate() {
        let id_index = record.iter().position(|f| f.trim().eq_ignore_ascii_case("id"));
        let name_index = record
            .iter()
            .position(|f| f.trim().eq_ignore_ascii_case("name"));
        if let (Some(id), Some(name)) = (id_index, name_index) {
            header = Some((row, id, name));
            break;
        }
    }
    let Some((header_row, id_index, name_index)) = header else {
        return Err(AttendanceError::Roster {
            path: path.to_path_buf(),
            reason: "appropriate headers not found".to_string(),
        });
    };

    let mut identities = Vec::new();
    for (row, record) in records.iter().enumerate().skip(header_row + 1) {
        let name = record.get(name_index).unwrap_or_default().trim();
        let Some((last, first)) = name.split_once(',') else {
            warn!(
                "Skipping roster row {} in {}: name {:?} is not in Last, First form",
                row + 1,
                path.display(),
                name
            );
            continue;
        };
        let student_id = record
            .get(id_index)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        identities.push(AttendeeIdentity {
            first_name: first.trim().to_string(),
            last_name: last.trim().to_string(),
            grade_level,
            student_id,
            homeroom: Some(teacher.clone()),
        });
    }

    debug!(
        "Loaded {} roster members from {}",
        identities.len(),
        path.display()
    );
    Ok(identities)
}

// ── IdentityResolver ──────────────────────────────────────────────────────────

/// Maps a raw attendee label to a canonical identity.
///
/// Implementations may be arbitrarily clever (fuzzy matching, per-grade
/// elimination); the pipeline only relies on this contract.
pub trait IdentityResolver {
    /// Resolve `raw_label`, or `None` when no unambiguous match exists.
    fn resolve(&self, raw_label: &str) -> Option<&AttendeeIdentity>;
}

/// Exact-match resolver over an owned [`Roster`].
///
/// Labels are normalized and looked up against normalized roster display
/// names. A label shared by several roster members is unresolvable here.
#[derive(Debug)]
pub struct RosterResolver {
    roster: Roster,
    by_name: BTreeMap<String, Vec<IdentityKey>>,
}

impl RosterResolver {
    pub fn new(roster: Roster) -> Self {
        let mut by_name: BTreeMap<String, Vec<IdentityKey>> = BTreeMap::new();
        for identity in roster.iter() {
            by_name
                .entry(normalize_attendee_label(&identity.display_name()))
                .or_default()
                .push(identity.key());
        }
        Self { roster, by_name }
    }

    /// The roster this resolver was built over.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }
}

impl IdentityResolver for RosterResolver {
    fn resolve(&self, raw_label: &str) -> Option<&AttendeeIdentity> {
        let needle = normalize_attendee_label(raw_label);
        if needle.is_empty() {
            return None;
        }
        let keys = self.by_name.get(&needle)?;
        if keys.len() > 1 {
            debug!(
                "Attendee label {:?} matches {} roster members; leaving unresolved",
                raw_label,
                keys.len()
            );
            return None;
        }
        self.roster.get(&keys[0])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
