use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Identity ──────────────────────────────────────────────────────────────────

/// Canonical key for a roster member.
///
/// An explicit value tuple of normalized name and grade level. Two keys are
/// equal exactly when both components are equal; ordering is derived
/// lexicographically, which gives deterministic iteration everywhere a key
/// set is walked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    /// Normalized full name (see [`normalize_attendee_label`]).
    pub name: String,
    /// Grade level / cohort tag.
    pub grade_level: u8,
}

/// A known person, owned by the roster.
///
/// Records never own identities; they reference them through [`IdentityKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeIdentity {
    pub first_name: String,
    pub last_name: String,
    pub grade_level: u8,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub homeroom: Option<String>,
}

impl AttendeeIdentity {
    /// Display name in `"First Last"` form.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The canonical lookup key for this identity.
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            name: normalize_attendee_label(&self.display_name()),
            grade_level: self.grade_level,
        }
    }
}

/// Normalise a raw attendee label into its canonical lookup form.
///
/// * lowercased;
/// * `.` treated as a name delimiter and replaced with a space;
/// * the popular `ω` emoticon character removed;
/// * remaining ASCII punctuation stripped;
/// * whitespace collapsed to single spaces.
///
/// # Examples
///
/// ```
/// use attendance_core::models::normalize_attendee_label;
///
/// assert_eq!(normalize_attendee_label("Alice.Anderson"), "alice anderson");
/// assert_eq!(normalize_attendee_label("  Bob  BAKER!! "), "bob baker");
/// assert_eq!(normalize_attendee_label("ω Cara ω"), "cara");
/// ```
pub fn normalize_attendee_label(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace(['.', 'ω'], " ");
    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Meeting identity ──────────────────────────────────────────────────────────

/// The identity of one meeting instance: topic plus start time.
///
/// Pure value equality on an explicit tuple type; derived ordering sorts by
/// topic, then start time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeetingId {
    pub topic: String,
    pub timestamp: NaiveDateTime,
}

// ── AttendanceRecord ──────────────────────────────────────────────────────────

/// One parsed meeting instance.
///
/// The attendee set IS the key set of `per_attendee_duration`, so the
/// invariant `attendees == keys(per_attendee_duration)` holds by
/// construction. Immutable once built by the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    /// Export file name this record was parsed from.
    pub source: String,
    /// Meeting topic as reported by the export.
    pub topic: String,
    /// Local start time (exports carry no timezone).
    pub timestamp: NaiveDateTime,
    /// Scheduled meeting duration in minutes.
    pub duration_minutes: u32,
    /// Minutes attended per resolved attendee.
    pub per_attendee_duration: BTreeMap<IdentityKey, u32>,
}

impl AttendanceRecord {
    /// The value identity of this meeting instance.
    pub fn id(&self) -> MeetingId {
        MeetingId {
            topic: self.topic.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Iterate the resolved attendee keys in deterministic order.
    pub fn attendees(&self) -> impl Iterator<Item = &IdentityKey> {
        self.per_attendee_duration.keys()
    }

    /// Number of resolved attendees.
    pub fn attendee_count(&self) -> usize {
        self.per_attendee_duration.len()
    }
}

/// Size of the union of two records' attendee sets.
pub fn attendee_union_count(a: &AttendanceRecord, b: &AttendanceRecord) -> usize {
    a.attendees()
        .chain(b.attendees())
        .collect::<BTreeSet<_>>()
        .len()
}

// ── Cluster ───────────────────────────────────────────────────────────────────

/// An ordered sequence of records believed to be recurrences of the same
/// meeting, in arrival order.
///
/// The *representative* is the record with the largest attendee count seen so
/// far; attendee count is only a partial order, so ties keep the earliest
/// arrival rather than assuming any total order.
#[derive(Debug, Clone)]
pub struct Cluster {
    records: Vec<AttendanceRecord>,
    representative: usize,
}

impl Cluster {
    /// Start a cluster from its first record.
    pub fn new(record: AttendanceRecord) -> Self {
        Self {
            records: vec![record],
            representative: 0,
        }
    }

    /// Append a record, moving the representative if this one is strictly
    /// larger.
    pub fn push(&mut self, record: AttendanceRecord) {
        if record.attendee_count() > self.records[self.representative].attendee_count() {
            self.representative = self.records.len();
        }
        self.records.push(record);
    }

    /// All records in arrival order.
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// The comparison baseline for new candidates.
    pub fn representative(&self) -> &AttendanceRecord {
        &self.records[self.representative]
    }

    /// The most recently arrived record.
    pub fn latest(&self) -> &AttendanceRecord {
        self.records.last().expect("cluster is never empty")
    }

    /// Historical high attendance, i.e. the representative's attendee count.
    pub fn historical_max_attendance(&self) -> usize {
        self.representative().attendee_count()
    }

    /// Latest attendance over the historical high.
    ///
    /// `0.0` for clusters whose historical high is zero (all-empty records).
    pub fn health_score(&self) -> f64 {
        let max = self.historical_max_attendance();
        if max == 0 {
            return 0.0;
        }
        self.latest().attendee_count() as f64 / max as f64
    }
}

// ── ClusterSet ────────────────────────────────────────────────────────────────

/// All clusters produced by one clustering run, in creation order.
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    /// Clusters in creation order.
    pub clusters: Vec<Cluster>,
    /// How many records could have matched more than one cluster under the
    /// threshold test (diagnostic only; placement is still first-match).
    pub ambiguous_assignments: usize,
}

impl ClusterSet {
    /// Resolve a sparse `file name → label` map into `label → cluster index`.
    ///
    /// For each cluster, the first record (arrival order) whose source appears
    /// in the label map names the cluster. Clusters with no tagged record are
    /// absent from the result and remain reachable only through `clusters`.
    /// Running this twice over the same set yields an identical map.
    pub fn resolve_labels(&self, label_map: &BTreeMap<String, String>) -> BTreeMap<String, usize> {
        let mut labels = BTreeMap::new();
        for (index, cluster) in self.clusters.iter().enumerate() {
            for record in cluster.records() {
                if let Some(label) = label_map.get(&record.source) {
                    labels.insert(label.clone(), index);
                    break;
                }
            }
        }
        labels
    }
}

// ── Attendance buckets ────────────────────────────────────────────────────────

/// Display classification for a student-record attendance duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Red,
    Yellow,
    Green,
}

/// Minimum-minute thresholds for the three display buckets.
///
/// Thresholds must be strictly increasing (`red < yellow < green`); a
/// duration below `red` gets no classification at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketThresholds {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
}

impl Default for BucketThresholds {
    fn default() -> Self {
        Self {
            red: 0,
            yellow: 15,
            green: 30,
        }
    }
}

impl BucketThresholds {
    /// Build validated thresholds.
    ///
    /// Returns a human-readable message when the ordering constraint is
    /// violated; the caller wraps it into the configuration error.
    pub fn new(red: u32, yellow: u32, green: u32) -> Result<Self, String> {
        if !(red < yellow && yellow < green) {
            return Err(format!(
                "attendance thresholds must be strictly increasing, got red={red} yellow={yellow} green={green}"
            ));
        }
        Ok(Self { red, yellow, green })
    }

    /// Classify a recorded duration into the highest bucket whose threshold
    /// it meets or exceeds.
    pub fn classify(&self, minutes: u32) -> Option<Bucket> {
        if minutes >= self.green {
            Some(Bucket::Green)
        } else if minutes >= self.yellow {
            Some(Bucket::Yellow)
        } else if minutes >= self.red {
            Some(Bucket::Red)
        } else {
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
