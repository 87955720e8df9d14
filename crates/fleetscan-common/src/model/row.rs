//! Enriched report rows and per-task results

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::{OsFamily, Readiness, ScanTask};
use crate::Classification;

/// One report row: a node joined with its cluster, recommendation and
/// readiness, plus derived compliance fields.
///
/// The synthetic row for a cluster with no running nodes has every
/// node-level field set to `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnrichedNodeRow {
    /// Owning tenant, inherited from the task
    pub tenant_id: String,
    /// Tenant display name
    pub tenant_name: String,
    /// Region, inherited from the task
    pub region: String,
    /// Cluster name
    pub cluster_name: String,
    /// Cluster platform version as reported
    pub cluster_version: Option<String>,
    /// Instance id
    pub instance_id: Option<String>,
    /// Current image id
    pub current_image_id: Option<String>,
    /// Current image publication date
    pub current_image_publication_date: Option<NaiveDate>,
    /// Days since the current image was published
    pub image_age_days: Option<i64>,
    /// OS family of the current image
    pub os_family: Option<OsFamily>,
    /// Instance type
    pub instance_class: Option<String>,
    /// Lifecycle state
    pub node_state: Option<String>,
    /// Uptime, "<d> days <h> hours"
    pub node_uptime: Option<String>,
    /// Recommended image id for this node's platform version and family
    pub latest_image_id: Option<String>,
    /// Recommended image publication date
    pub latest_image_publication_date: Option<NaiveDate>,
    /// Image older than the patch-age threshold
    pub patch_pending: bool,
    /// Readiness as reported by the cluster API
    pub node_readiness: Option<Readiness>,
    /// Cluster version within tolerance of the newest catalog version
    pub version_compliance: bool,
    /// When the row was produced
    pub audit_timestamp: DateTime<Utc>,
}

impl EnrichedNodeRow {
    /// Deterministic report ordering key
    pub fn sort_key(&self) -> (&str, &str, &str, Option<&str>) {
        (
            &self.tenant_id,
            &self.region,
            &self.cluster_name,
            self.instance_id.as_deref(),
        )
    }

    /// Whether this is the synthetic row for a cluster without nodes
    pub fn is_empty_cluster_row(&self) -> bool {
        self.instance_id.is_none()
    }
}

/// What a task produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ScanOutcome {
    /// Task finished; rows may be empty when the region had no clusters
    Success {
        /// Rows in collection order
        rows: Vec<EnrichedNodeRow>,
    },
    /// Task aborted
    Failure {
        /// Classified error detail
        detail: Classification,
    },
}

/// Result of one task; produced exactly once
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// The task this result is for
    pub task: ScanTask,
    /// Outcome
    pub outcome: ScanOutcome,
}

impl ScanResult {
    /// Successful result
    pub fn success(task: ScanTask, rows: Vec<EnrichedNodeRow>) -> Self {
        Self {
            task,
            outcome: ScanOutcome::Success { rows },
        }
    }

    /// Failed result
    pub fn failure(task: ScanTask, detail: Classification) -> Self {
        Self {
            task,
            outcome: ScanOutcome::Failure { detail },
        }
    }

    /// Whether the task succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Success { .. })
    }

    /// Rows contributed; empty for failures
    pub fn rows(&self) -> &[EnrichedNodeRow] {
        match &self.outcome {
            ScanOutcome::Success { rows } => rows,
            ScanOutcome::Failure { .. } => &[],
        }
    }

    /// Error detail, present iff the task failed
    pub fn error_detail(&self) -> Option<&Classification> {
        match &self.outcome {
            ScanOutcome::Success { .. } => None,
            ScanOutcome::Failure { detail } => Some(detail),
        }
    }
}

/// A failed task and why
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    /// The task
    pub task: ScanTask,
    /// Classified error
    pub detail: Classification,
}

/// The merged result of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    /// All rows from successful tasks, sorted
    pub rows: Vec<EnrichedNodeRow>,
    /// Tasks that resolved
    pub total_tasks: usize,
    /// Successful tasks
    pub successes: usize,
    /// Failed tasks
    pub failures: usize,
    /// Row count
    pub total_rows: usize,
    /// Failed tasks, sorted by task
    pub failed: Vec<FailedTask>,
}
