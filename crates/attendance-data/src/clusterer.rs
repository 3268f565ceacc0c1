//! Incremental grouping of meeting instances into recurring-meeting clusters.
//!
//! Single-pass, order-dependent: each record is compared against the
//! representative of every existing cluster in creation order and joins the
//! first one that passes the union/total ratio test. The caller must feed
//! records in a deterministic order (the reader's lexicographic file order)
//! for reruns to reproduce the same clusters.

use attendance_core::error::{AttendanceError, Result};
use attendance_core::models::{attendee_union_count, AttendanceRecord, Cluster, ClusterSet};
use tracing::debug;

// ── GroupClusterer ────────────────────────────────────────────────────────────

/// Assigns each incoming record to an existing cluster or starts a new one.
///
/// The match test: with `P` a cluster's representative and `R` the incoming
/// record, `total = |P| + |R|` and `union = |P ∪ R|`; the record joins the
/// first cluster where `total * ratio_threshold > union`. With perfect
/// attendance `union == total / 2`, so the threshold expresses how far
/// attendance may drop before two instances stop looking related.
#[derive(Debug)]
pub struct GroupClusterer {
    ratio_threshold: f64,
    clusters: Vec<Cluster>,
    ambiguous_assignments: usize,
}

impl GroupClusterer {
    /// Create a clusterer.
    ///
    /// `ratio_threshold` must lie in the open interval (0, 1).
    pub fn new(ratio_threshold: f64) -> Result<Self> {
        if !(ratio_threshold > 0.0 && ratio_threshold < 1.0) {
            return Err(AttendanceError::Config(format!(
                "ratio threshold must lie in (0, 1), got {ratio_threshold}"
            )));
        }
        Ok(Self {
            ratio_threshold,
            clusters: Vec::new(),
            ambiguous_assignments: 0,
        })
    }

    pub fn ratio_threshold(&self) -> f64 {
        self.ratio_threshold
    }

    /// Clusters built so far, in creation order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Assign one record; returns the index of the cluster it joined.
    ///
    /// Each record must be assigned exactly once; re-assigning the same
    /// record is undefined. Clusters are scanned first-created-first-tried
    /// and the first match wins (early-accept, not best-fit). The scan still
    /// finishes so that records which would have matched additional clusters
    /// are counted as ambiguous for diagnostics; placement is unaffected.
    pub fn assign(&mut self, record: AttendanceRecord) -> usize {
        let mut chosen: Option<usize> = None;

        for (index, cluster) in self.clusters.iter().enumerate() {
            if !Self::is_match(cluster.representative(), &record, self.ratio_threshold) {
                continue;
            }
            if chosen.is_none() {
                debug!(
                    "{} matches cluster {} (representative {})",
                    record.source,
                    index,
                    cluster.representative().source
                );
                chosen = Some(index);
            } else {
                self.ambiguous_assignments += 1;
                debug!(
                    "{} would also match cluster {}; keeping first match",
                    record.source, index
                );
            }
        }

        match chosen {
            Some(index) => {
                self.clusters[index].push(record);
                index
            }
            None => {
                self.clusters.push(Cluster::new(record));
                self.clusters.len() - 1
            }
        }
    }

    /// Finish the run and hand the clusters over read-only.
    pub fn into_cluster_set(self) -> ClusterSet {
        ClusterSet {
            clusters: self.clusters,
            ambiguous_assignments: self.ambiguous_assignments,
        }
    }

    /// The union/total ratio test.
    ///
    /// `total == 0` (both sides empty) is guarded as "no match": degenerate
    /// empty records always fall through to a new singleton cluster.
    fn is_match(representative: &AttendanceRecord, record: &AttendanceRecord, ratio: f64) -> bool {
        let total = representative.attendee_count() + record.attendee_count();
        if total == 0 {
            return false;
        }
        let union = attendee_union_count(representative, record);
        (total as f64) * ratio > union as f64
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
