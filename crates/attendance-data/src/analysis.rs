//! Top-level report pipeline.
//!
//! Orchestrates loading, clustering, label resolution, and report assembly.
//! The whole pipeline is a strict, ordered, single-threaded pass: the
//! clustering step is order-dependent by contract and must stay serialized
//! even if callers ever parallelise ingestion.

use std::collections::BTreeMap;
use std::path::Path;

use attendance_core::error::Result;
use attendance_core::models::BucketThresholds;
use attendance_core::roster::{IdentityResolver, Roster};
use chrono::Utc;
use tracing::{debug, info};

use crate::clusterer::GroupClusterer;
use crate::reader::load_attendance_records;
use crate::report::{AttendanceReport, ReportAssembler, ReportMetadata};

// ── Options ───────────────────────────────────────────────────────────────────

/// Externally visible configuration of one pipeline run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Cluster-match ratio threshold, open interval (0, 1).
    pub ratio_threshold: f64,
    /// Display bucket thresholds.
    pub thresholds: BucketThresholds,
    /// Sparse `export file name → label` map.
    pub label_map: BTreeMap<String, String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.75,
            thresholds: BucketThresholds::default(),
            label_map: BTreeMap::new(),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run the full pipeline over one directory of exports.
///
/// 1. Validate configuration (fails before any file is touched).
/// 2. Load and parse exports in lexicographic order, collecting the
///    skipped-file manifest and the unresolved-label tally.
/// 3. Assign every record to a cluster, strictly sequentially.
/// 4. Resolve the sparse label map.
/// 5. Assemble the report.
pub fn run_report(
    exports_dir: &Path,
    resolver: &dyn IdentityResolver,
    roster: &Roster,
    options: &ReportOptions,
) -> Result<AttendanceReport> {
    let mut clusterer = GroupClusterer::new(options.ratio_threshold)?;

    // ── Step 1: Load exports ──────────────────────────────────────────────────
    let load_start = std::time::Instant::now();
    let outcome = load_attendance_records(exports_dir, resolver);
    let load_time = load_start.elapsed().as_secs_f64();

    let files_processed = outcome.records.len();
    let files_skipped = outcome.skipped.len();

    // ── Step 2: Cluster ───────────────────────────────────────────────────────
    let cluster_start = std::time::Instant::now();
    let records_clustered = outcome.records.len();
    for record in outcome.records {
        clusterer.assign(record);
    }
    let set = clusterer.into_cluster_set();
    let cluster_time = cluster_start.elapsed().as_secs_f64();

    debug!(
        "Clustered {} records into {} clusters ({} ambiguous)",
        records_clustered,
        set.clusters.len(),
        set.ambiguous_assignments
    );

    // ── Step 3: Labels ────────────────────────────────────────────────────────
    let labels = set.resolve_labels(&options.label_map);

    // ── Step 4: Assemble ──────────────────────────────────────────────────────
    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339(),
        files_discovered: files_processed + files_skipped,
        files_processed,
        files_skipped,
        records_clustered,
        clusters_created: set.clusters.len(),
        ambiguous_assignments: set.ambiguous_assignments,
        unresolved_name_count: outcome.unresolved.len(),
        load_time_seconds: load_time,
        cluster_time_seconds: cluster_time,
    };

    info!(
        "Report over {} files: {} clusters, {} unresolved labels",
        metadata.files_discovered, metadata.clusters_created, metadata.unresolved_name_count
    );

    let assembler = ReportAssembler::new(options.thresholds);
    Ok(assembler.assemble(
        &set,
        &labels,
        roster,
        &outcome.unresolved,
        outcome.skipped,
        metadata,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_core::models::AttendeeIdentity;
    use attendance_core::roster::RosterResolver;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        path
    }

    fn sample_export(topic: &str, start: &str, attendees: &[&str]) -> String {
        let mut out = String::from(
            "Meeting ID,Topic,Start Time,End Time,User Email,Duration (Minutes),Participants\n",
        );
        out.push_str(&format!(
            "912 3456 7890,{topic},{start},{start},teacher@school.org,61,{}\n",
            attendees.len()
        ));
        out.push('\n');
        out.push_str("Name (Original Name),User Email,Total Duration (Minutes),Guest\n");
        for name in attendees {
            out.push_str(&format!("{name},student@school.org,45,No\n"));
        }
        out
    }

    fn resolver() -> RosterResolver {
        let mut roster = Roster::new();
        for (first, last) in [
            ("Alice", "Anderson"),
            ("Bob", "Baker"),
            ("Cara", "Clark"),
            ("Dan", "Diaz"),
            ("Xena", "Xu"),
            ("Yara", "Young"),
            ("Zoe", "Zhang"),
        ] {
            roster.insert(AttendeeIdentity {
                first_name: first.to_string(),
                last_name: last.to_string(),
                grade_level: 6,
                student_id: None,
                homeroom: Some("Smith".to_string()),
            });
        }
        RosterResolver::new(roster)
    }

    const GROUP_ONE: &[&str] = &["Alice Anderson", "Bob Baker", "Cara Clark"];
    const GROUP_ONE_PLUS: &[&str] = &["Alice Anderson", "Bob Baker", "Cara Clark", "Dan Diaz"];
    const GROUP_TWO: &[&str] = &["Xena Xu", "Yara Young", "Zoe Zhang"];

    // ── run_report ────────────────────────────────────────────────────────────

    #[test]
    fn test_run_report_empty_directory() {
        let dir = TempDir::new().unwrap();
        let r = resolver();
        let report =
            run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();

        assert!(report.clusters.is_empty());
        assert!(report.students.is_empty());
        assert_eq!(report.metadata.files_discovered, 0);
    }

    #[test]
    fn test_run_report_groups_recurring_meetings() {
        let dir = TempDir::new().unwrap();
        // Lexicographic file names pin the clustering order.
        write_file(
            dir.path(),
            "a_day1.csv",
            &sample_export("Health", "9/24/2020 10:13:00 AM", GROUP_ONE),
        );
        write_file(
            dir.path(),
            "b_day2.csv",
            &sample_export("Health", "9/25/2020 10:13:00 AM", GROUP_ONE_PLUS),
        );
        write_file(
            dir.path(),
            "c_other.csv",
            &sample_export("Art", "9/25/2020 1:00:00 PM", GROUP_TWO),
        );

        let r = resolver();
        let report =
            run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();

        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[0].meeting_count, 2);
        assert_eq!(report.clusters[0].historical_max_attendance, 4);
        assert_eq!(report.clusters[1].meeting_count, 1);
        assert_eq!(report.metadata.records_clustered, 3);
        assert_eq!(report.metadata.clusters_created, 2);
    }

    #[test]
    fn test_run_report_resolves_labels() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "a_day1.csv",
            &sample_export("Health", "9/24/2020 10:13:00 AM", GROUP_ONE),
        );
        write_file(
            dir.path(),
            "b_day2.csv",
            &sample_export("Health", "9/25/2020 10:13:00 AM", GROUP_ONE),
        );

        let mut options = ReportOptions::default();
        options
            .label_map
            .insert("a_day1.csv".to_string(), "Health—SmithHR".to_string());

        let r = resolver();
        let report = run_report(dir.path(), &r, r.roster(), &options).unwrap();

        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].label.as_deref(), Some("Health—SmithHR"));
    }

    #[test]
    fn test_run_report_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "good.csv",
            &sample_export("Health", "9/24/2020 10:13:00 AM", GROUP_ONE),
        );
        write_file(dir.path(), "broken.csv", "Name,Email\nAlice,a@x.org\n");

        let r = resolver();
        let report =
            run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();

        assert_eq!(report.metadata.files_discovered, 2);
        assert_eq!(report.metadata.files_processed, 1);
        assert_eq!(report.metadata.files_skipped, 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.skipped_files[0].path.ends_with("broken.csv"));
    }

    #[test]
    fn test_run_report_surfaces_unresolved_names() {
        let dir = TempDir::new().unwrap();
        let mut attendees = GROUP_ONE.to_vec();
        attendees.push("Mystery Kid");
        write_file(
            dir.path(),
            "one.csv",
            &sample_export("Health", "9/24/2020 10:13:00 AM", &attendees),
        );

        let r = resolver();
        let report =
            run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();

        assert_eq!(report.metadata.unresolved_name_count, 1);
        assert_eq!(report.unresolved[0].label, "Mystery Kid");
        assert_eq!(report.unresolved[0].count, 1);
        // The unresolved attendee never entered any cluster.
        assert_eq!(report.clusters[0].historical_max_attendance, 3);
    }

    #[test]
    fn test_run_report_rejects_bad_ratio_before_reading() {
        let dir = TempDir::new().unwrap();
        let r = resolver();
        let options = ReportOptions {
            ratio_threshold: 1.5,
            ..Default::default()
        };
        let err = run_report(dir.path(), &r, r.roster(), &options).unwrap_err();
        assert!(err.to_string().contains("ratio threshold"));
    }

    #[test]
    fn test_run_report_is_reproducible() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "a_day1.csv",
            &sample_export("Health", "9/24/2020 10:13:00 AM", GROUP_ONE),
        );
        write_file(
            dir.path(),
            "b_day2.csv",
            &sample_export("Health", "9/25/2020 10:13:00 AM", GROUP_ONE_PLUS),
        );

        let r = resolver();
        let first = run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();
        let second = run_report(dir.path(), &r, r.roster(), &ReportOptions::default()).unwrap();

        assert_eq!(first.clusters.len(), second.clusters.len());
        assert_eq!(
            first.clusters[0].records[0].source,
            second.clusters[0].records[0].source
        );
    }
}
