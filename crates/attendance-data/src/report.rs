//! Report assembly over a finished cluster set.
//!
//! Computes per-student, per-cluster, and run-wide aggregates and packages
//! them as plain serialisable data. All presentation (spreadsheets, tables,
//! colour) belongs to the rendering collaborator downstream.

use std::collections::BTreeMap;

use attendance_core::models::{Bucket, BucketThresholds, Cluster, ClusterSet, IdentityKey};
use attendance_core::roster::Roster;
use attendance_core::stats::percentile;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::reader::SkippedFile;

// ── Output structures ─────────────────────────────────────────────────────────

/// One attendee's minutes in one meeting instance, with its display bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeLine {
    pub name: String,
    pub grade_level: u8,
    pub minutes: u32,
    /// Highest bucket whose threshold the minutes meet; `None` below red.
    pub bucket: Option<Bucket>,
}

/// One meeting instance within a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub source: String,
    pub topic: String,
    pub timestamp: NaiveDateTime,
    pub attendee_count: usize,
    /// This instance's attendance over the cluster's historical high.
    pub attendance_ratio: f64,
    pub attendees: Vec<AttendeeLine>,
}

/// One recurring-meeting cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Human-supplied label, when a record of this cluster was tagged.
    pub label: Option<String>,
    pub meeting_count: usize,
    /// The representative's attendee count, the normalisation baseline.
    pub historical_max_attendance: usize,
    /// Latest attendance over the historical high.
    pub health_score: f64,
    pub records: Vec<RecordSummary>,
}

/// Decile standing of a student's total attendance across all clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Top,
    Bottom,
}

/// Cross-cluster attendance totals for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSummary {
    pub name: String,
    pub grade_level: u8,
    pub total_minutes: u64,
    pub meetings_attended: u32,
    /// Set when the student falls in the top or bottom attendance decile.
    pub standing: Option<Standing>,
}

/// A raw attendee label that never resolved, with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedName {
    pub label: String,
    pub count: usize,
}

/// Run statistics reported alongside the aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub records_clustered: usize,
    pub clusters_created: usize,
    /// Records that could have matched more than one cluster.
    pub ambiguous_assignments: usize,
    /// Distinct raw labels that failed identity resolution.
    pub unresolved_name_count: usize,
    /// Wall-clock seconds spent reading and parsing exports.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent clustering.
    pub cluster_time_seconds: f64,
}

/// The complete presentation-ready output of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub clusters: Vec<ClusterSummary>,
    pub students: Vec<StudentSummary>,
    pub unresolved: Vec<UnresolvedName>,
    pub skipped_files: Vec<SkippedFile>,
    pub metadata: ReportMetadata,
}

// ── ReportAssembler ───────────────────────────────────────────────────────────

/// Builds an [`AttendanceReport`] from a finished [`ClusterSet`].
pub struct ReportAssembler {
    thresholds: BucketThresholds,
}

impl ReportAssembler {
    pub fn new(thresholds: BucketThresholds) -> Self {
        Self { thresholds }
    }

    /// Assemble the full report.
    ///
    /// `labels` is the resolved `label → cluster index` map; `unresolved` the
    /// cross-file tally of labels that failed identity resolution.
    pub fn assemble(
        &self,
        set: &ClusterSet,
        labels: &BTreeMap<String, usize>,
        roster: &Roster,
        unresolved: &BTreeMap<String, usize>,
        skipped: Vec<SkippedFile>,
        metadata: ReportMetadata,
    ) -> AttendanceReport {
        let mut label_by_index: BTreeMap<usize, &str> = BTreeMap::new();
        for (label, index) in labels {
            label_by_index.insert(*index, label.as_str());
        }

        let clusters = set
            .clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                self.cluster_summary(cluster, label_by_index.get(&index).map(|l| l.to_string()), roster)
            })
            .collect();

        let students = Self::student_summaries(set, roster);

        let mut unresolved: Vec<UnresolvedName> = unresolved
            .iter()
            .map(|(label, count)| UnresolvedName {
                label: label.clone(),
                count: *count,
            })
            .collect();
        // Most frequent first; the map already orders ties by label.
        unresolved.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        AttendanceReport {
            clusters,
            students,
            unresolved,
            skipped_files: skipped,
            metadata,
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn cluster_summary(
        &self,
        cluster: &Cluster,
        label: Option<String>,
        roster: &Roster,
    ) -> ClusterSummary {
        let max = cluster.historical_max_attendance();
        let records = cluster
            .records()
            .iter()
            .map(|record| {
                let attendees = record
                    .per_attendee_duration
                    .iter()
                    .map(|(key, minutes)| AttendeeLine {
                        name: display_name(roster, key),
                        grade_level: key.grade_level,
                        minutes: *minutes,
                        bucket: self.thresholds.classify(*minutes),
                    })
                    .collect();
                RecordSummary {
                    source: record.source.clone(),
                    topic: record.topic.clone(),
                    timestamp: record.timestamp,
                    attendee_count: record.attendee_count(),
                    attendance_ratio: if max == 0 {
                        0.0
                    } else {
                        record.attendee_count() as f64 / max as f64
                    },
                    attendees,
                }
            })
            .collect();

        ClusterSummary {
            label,
            meeting_count: cluster.records().len(),
            historical_max_attendance: max,
            health_score: cluster.health_score(),
            records,
        }
    }

    fn student_summaries(set: &ClusterSet, roster: &Roster) -> Vec<StudentSummary> {
        let mut totals: BTreeMap<&IdentityKey, (u64, u32)> = BTreeMap::new();
        for cluster in &set.clusters {
            for record in cluster.records() {
                for (key, minutes) in &record.per_attendee_duration {
                    let entry = totals.entry(key).or_insert((0, 0));
                    entry.0 += u64::from(*minutes);
                    entry.1 += 1;
                }
            }
        }

        // Decile cut-offs over total minutes; meaningless for a single student.
        let mut sorted_minutes: Vec<f64> = totals.values().map(|(m, _)| *m as f64).collect();
        sorted_minutes.sort_by(|a, b| a.partial_cmp(b).expect("minutes are finite"));
        let cutoffs = if sorted_minutes.len() >= 2 {
            Some((
                percentile(&sorted_minutes, 90.0),
                percentile(&sorted_minutes, 10.0),
            ))
        } else {
            None
        };

        let mut students: Vec<StudentSummary> = totals
            .into_iter()
            .map(|(key, (total_minutes, meetings_attended))| {
                let standing = cutoffs.and_then(|(top, bottom)| {
                    let minutes = total_minutes as f64;
                    if minutes >= top {
                        Some(Standing::Top)
                    } else if minutes <= bottom {
                        Some(Standing::Bottom)
                    } else {
                        None
                    }
                });
                StudentSummary {
                    name: display_name(roster, key),
                    grade_level: key.grade_level,
                    total_minutes,
                    meetings_attended,
                    standing,
                }
            })
            .collect();

        students.sort_by(|a, b| {
            b.total_minutes
                .cmp(&a.total_minutes)
                .then_with(|| a.name.cmp(&b.name))
        });
        students
    }
}

/// Roster display name for a key, falling back to the key's own name.
fn display_name(roster: &Roster, key: &IdentityKey) -> String {
    roster
        .get(key)
        .map(|identity| identity.display_name())
        .unwrap_or_else(|| key.name.clone())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
