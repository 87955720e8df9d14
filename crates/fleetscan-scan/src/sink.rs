//! Report persistence
//!
//! The engine hands the finalized report to a [`ReportSink`]; where it ends
//! up (local file, object store, both) is the sink's business.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info};

use fleetscan_common::model::AggregateReport;
use fleetscan_common::report::to_csv_bytes;
use fleetscan_common::{Error, Result};

/// Destination for the finalized report
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Persist the report
    async fn persist(&self, report: &AggregateReport) -> Result<()>;
}

/// Writes the report as CSV to a local path
#[derive(Clone, Debug)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    /// Sink writing to `path`; parent directories are created as needed
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for CsvFileSink {
    fn name(&self) -> &str {
        "csv-file"
    }

    async fn persist(&self, report: &AggregateReport) -> Result<()> {
        let bytes = to_csv_bytes(report)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| Error::io(format!("writing {}", self.path.display()), e))?;
        info!(path = %self.path.display(), rows = report.total_rows, "Report written");
        Ok(())
    }
}

/// Persists to each sink in order; every sink is tried and the first error
/// is returned
pub struct FanoutSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanoutSink {
    /// Fan out to `sinks`
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ReportSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn persist(&self, report: &AggregateReport) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.persist(report).await {
                error!(sink = sink.name(), error = %e, "Report sink failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
