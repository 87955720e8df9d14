//! End-to-end scan: execute tasks, aggregate, finalize, persist

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleetscan_common::model::{AggregateReport, ScanTask};
use fleetscan_common::Error;

use crate::aggregator::Aggregator;
use crate::executor::{ExecutionStatus, Executor, TaskRunner};
use crate::sink::ReportSink;

/// Result of a full run
#[derive(Debug)]
pub struct RunOutcome {
    /// Finalized report
    pub report: AggregateReport,
    /// Execution status (dispatch counts, interruption)
    pub status: ExecutionStatus,
    /// Set when the sink failed to persist the report
    pub sink_error: Option<Error>,
}

impl RunOutcome {
    /// Whether every task succeeded and the report was persisted
    pub fn is_clean(&self) -> bool {
        self.report.failures == 0 && !self.status.interrupted && self.sink_error.is_none()
    }
}

/// Wires the executor, aggregator and sink together
pub struct ScanPipeline {
    executor: Executor,
    runner: Arc<dyn TaskRunner>,
    sink: Arc<dyn ReportSink>,
}

impl ScanPipeline {
    /// Create a pipeline
    pub fn new(executor: Executor, runner: Arc<dyn TaskRunner>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            executor,
            runner,
            sink,
        }
    }

    /// Run every task and persist the report.
    ///
    /// Always finalizes and persists, even when every task failed or the run
    /// was interrupted.
    pub async fn run(&self, tasks: Vec<ScanTask>, cancel: CancellationToken) -> RunOutcome {
        let total = tasks.len();
        let aggregator = Aggregator::new();

        let status = self
            .executor
            .run(tasks, self.runner.clone(), cancel, |result| {
                aggregator.add(result);
                let resolved = aggregator.resolved();
                info!(resolved, total, "Progress");
            })
            .await;

        let report = aggregator.finalize();
        info!(
            tasks = report.total_tasks,
            successes = report.successes,
            failures = report.failures,
            rows = report.total_rows,
            interrupted = status.interrupted,
            "Scan finished"
        );

        let sink_error = match self.sink.persist(&report).await {
            Ok(()) => None,
            Err(e) => {
                warn!(sink = self.sink.name(), error = %e, "Failed to persist report");
                Some(e)
            }
        };

        RunOutcome {
            report,
            status,
            sink_error,
        }
    }
}
