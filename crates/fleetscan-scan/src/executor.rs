//! Bounded-concurrency task execution
//!
//! A fixed pool of workers claims tasks in plan order from a shared index.
//! Each task runs in its own spawned future, so a panic in one task becomes a
//! failed result instead of taking down the worker. Results flow through an
//! unbounded channel to a single consumer, in completion order.
//!
//! On cancellation no new task is claimed. In-flight tasks get a grace
//! period, after which they are aborted. Every task yields exactly one
//! result: unclaimed and aborted tasks are reported as cancelled failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fleetscan_common::model::{ScanResult, ScanTask};
use fleetscan_common::{classify, Error, DEFAULT_WORKER_COUNT, MAX_WORKER_COUNT};

/// Default time in-flight tasks get to finish after an interrupt
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Runs one task to a result. Implementations never return errors: failures
/// are folded into the result.
#[async_trait]
pub trait TaskRunner: Send + Sync + 'static {
    /// Run `task` to completion
    async fn run(&self, task: ScanTask) -> ScanResult;
}

/// Worker pool settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Number of concurrent workers, 1..=64
    pub worker_count: usize,
    /// How long in-flight tasks may run after cancellation
    pub grace_period: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// How a run ended
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStatus {
    /// Tasks handed to the runner
    pub dispatched: usize,
    /// Tasks never started because of cancellation
    pub skipped: usize,
    /// Whether cancellation was requested before all tasks finished
    pub interrupted: bool,
}

/// Fixed-size worker pool
#[derive(Clone, Debug, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

fn cancelled_result(task: ScanTask, context: &str) -> ScanResult {
    ScanResult::failure(task, classify(&Error::cancelled(context)))
}

impl Executor {
    /// Create an executor; the worker count is clamped to 1..=64
    pub fn new(config: ExecutorConfig) -> Self {
        let worker_count = config.worker_count.clamp(1, MAX_WORKER_COUNT);
        Self {
            config: ExecutorConfig {
                worker_count,
                ..config
            },
        }
    }

    /// Effective configuration
    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Run every task, handing each result to `on_result` as it completes.
    ///
    /// Returns once every task has produced exactly one result.
    pub async fn run<F>(
        &self,
        tasks: Vec<ScanTask>,
        runner: Arc<dyn TaskRunner>,
        cancel: CancellationToken,
        mut on_result: F,
    ) -> ExecutionStatus
    where
        F: FnMut(ScanResult),
    {
        let tasks: Arc<[ScanTask]> = tasks.into();
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = self.config.worker_count.min(tasks.len().max(1));
        info!(tasks = tasks.len(), workers, "Starting scan workers");

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    tasks.clone(),
                    next.clone(),
                    runner.clone(),
                    cancel.clone(),
                    self.config.grace_period,
                    tx.clone(),
                ))
            })
            .collect();
        drop(tx);

        while let Some(result) = rx.recv().await {
            on_result(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Scan worker exited abnormally");
            }
        }

        let dispatched = next.load(Ordering::SeqCst).min(tasks.len());
        let skipped = tasks.len() - dispatched;
        for task in tasks[dispatched..].iter().cloned() {
            on_result(cancelled_result(task, "executor: not started"));
        }
        if skipped > 0 {
            warn!(skipped, "Tasks not started because the scan was interrupted");
        }

        ExecutionStatus {
            dispatched,
            skipped,
            interrupted: cancel.is_cancelled(),
        }
    }
}

async fn worker_loop(
    worker: usize,
    tasks: Arc<[ScanTask]>,
    next: Arc<AtomicUsize>,
    runner: Arc<dyn TaskRunner>,
    cancel: CancellationToken,
    grace: Duration,
    tx: mpsc::UnboundedSender<ScanResult>,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let index = next.fetch_add(1, Ordering::SeqCst);
        let Some(task) = tasks.get(index).cloned() else {
            break;
        };
        debug!(worker, task = %task, "Claimed task");

        let result = run_one(task, runner.clone(), &cancel, grace).await;
        if tx.send(result).is_err() {
            break;
        }
    }
}

async fn run_one(
    task: ScanTask,
    runner: Arc<dyn TaskRunner>,
    cancel: &CancellationToken,
    grace: Duration,
) -> ScanResult {
    let owned = task.clone();
    let mut handle = tokio::spawn(async move { runner.run(owned).await });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = cancel.cancelled() => {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!(task = %task, grace_secs = grace.as_secs(), "Abandoning in-flight task");
                    return cancelled_result(task, "executor: abandoned after grace period");
                }
            }
        }
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => cancelled_result(task, "executor: aborted"),
        Err(e) => {
            error!(task = %task, error = %e, "Task panicked");
            let err = Error::internal_with_context("executor", format!("task panicked: {e}"));
            ScanResult::failure(task, classify(&err))
        }
    }
}
