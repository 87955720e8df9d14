//! Thread-safe accumulation of task results into the final report

use parking_lot::Mutex;
use tracing::debug;

use fleetscan_common::model::{AggregateReport, FailedTask, ScanOutcome, ScanResult};

/// Accumulates results in any order; [`Aggregator::finalize`] sorts them
#[derive(Default)]
pub struct Aggregator {
    report: Mutex<AggregateReport>,
}

impl Aggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one task result
    pub fn add(&self, result: ScanResult) {
        let mut report = self.report.lock();
        report.total_tasks += 1;
        match result.outcome {
            ScanOutcome::Success { rows } => {
                debug!(task = %result.task, rows = rows.len(), "Task succeeded");
                report.successes += 1;
                report.total_rows += rows.len();
                report.rows.extend(rows);
            }
            ScanOutcome::Failure { detail } => {
                debug!(task = %result.task, category = %detail.category, "Task failed");
                report.failures += 1;
                report.failed.push(FailedTask {
                    task: result.task,
                    detail,
                });
            }
        }
    }

    /// Tasks resolved so far
    pub fn resolved(&self) -> usize {
        self.report.lock().total_tasks
    }

    /// Produce the final report, ordered by tenant, region, cluster and
    /// instance regardless of completion order
    pub fn finalize(self) -> AggregateReport {
        let mut report = self.report.into_inner();
        report.rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        report.failed.sort_by(|a, b| a.task.cmp(&b.task));
        report
    }
}
