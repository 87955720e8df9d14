//! `fleetscan scan`: run the audit and persist the report

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fleetscan_aws::{
    load_base_config, AwsConnector, ClusterTimeouts, S3Sink, SdkConfig, StsFederator,
    DEFAULT_HOME_REGION,
};
use fleetscan_common::retry::RetryConfig;
use fleetscan_scan::{
    CollectorSettings, CredentialFederator, CsvFileSink, Executor, ExecutorConfig, FanoutSink,
    ReportSink, RunOutcome, ScanPipeline, ScanRunner, TargetCollector,
};

use crate::config::AuditConfig;
use crate::error::{EXIT_CONFIG, EXIT_INTERRUPTED, EXIT_OK, EXIT_TASK_FAILURES};
use crate::format::print_summary;
use crate::{Error, Result};

use super::plan_from_config;

/// Exit code for a finished run
pub fn exit_code(outcome: &RunOutcome) -> u8 {
    if outcome.status.interrupted {
        EXIT_INTERRUPTED
    } else if outcome.report.failures > 0 {
        EXIT_TASK_FAILURES
    } else if outcome.sink_error.is_some() {
        EXIT_CONFIG
    } else {
        EXIT_OK
    }
}

/// Resolves when `signal` fires. A handler that could not be installed
/// never resolves, so the scan keeps running.
async fn signal_or_pending<F>(name: &str, signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(signal = name, error = %e, "Could not listen for signal");
        std::future::pending::<()>().await;
    }
}

/// Resolves on SIGINT or SIGTERM
async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal_or_pending("SIGINT", tokio::signal::ctrl_c()) => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not register SIGTERM handler");
                signal_or_pending("SIGINT", tokio::signal::ctrl_c()).await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        signal_or_pending("SIGINT", tokio::signal::ctrl_c()).await;
    }
}

fn build_sink(
    config: &AuditConfig,
    base: &SdkConfig,
    federator: Arc<dyn CredentialFederator>,
    audit_time: DateTime<Utc>,
) -> Arc<dyn ReportSink> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(CsvFileSink::new(&config.output))];
    if let Some(upload) = &config.upload {
        let file_name = config
            .output
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("fleetscan_report.csv");
        let mut sink = S3Sink::new(base.clone(), &upload.bucket, &upload.prefix, file_name, audit_time);
        if let Some(region) = &upload.region {
            sink = sink.with_region(region.clone());
        }
        if let Some(role) = &upload.role {
            sink = sink.with_upload_role(role.clone(), federator);
        }
        sinks.push(Box::new(sink));
    }
    Arc::new(FanoutSink::new(sinks))
}

/// Run the scan
pub async fn run(config: &AuditConfig) -> Result<u8> {
    let planned = plan_from_config(config)?;
    if planned.tasks.is_empty() {
        return Err(Error::targets(
            &config.targets,
            "no valid (tenant, region) pairs to scan",
        ));
    }
    let audit_time = Utc::now();
    info!(
        tasks = planned.tasks.len(),
        workers = config.worker_count,
        "Starting scan"
    );

    let base = load_base_config(config.profile.as_deref(), DEFAULT_HOME_REGION).await;
    let federator = Arc::new(StsFederator::new(&base));
    federator.base_identity().await;

    let connector = Arc::new(AwsConnector::new(
        base.clone(),
        ClusterTimeouts {
            read: config.readiness_timeout,
            ..ClusterTimeouts::default()
        },
    ));
    let collector = TargetCollector::new(CollectorSettings {
        readiness_timeout: config.readiness_timeout,
        retry: RetryConfig::single_retry(),
        tenant_names: config.tenant_names.clone(),
    });
    let runner = Arc::new(ScanRunner::new(
        federator.clone(),
        connector,
        collector,
        config.policy,
        audit_time,
    ));
    let sink = build_sink(config, &base, federator, audit_time);
    let executor = Executor::new(ExecutorConfig {
        worker_count: config.worker_count,
        grace_period: config.grace_period,
    });

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for_interrupt().await;
            warn!("Interrupt received; finishing in-flight tasks");
            cancel.cancel();
        })
    };

    let outcome = ScanPipeline::new(executor, runner, sink)
        .run(planned.tasks, cancel)
        .await;
    interrupt.abort();

    print_summary(&outcome.report);
    if let Some(e) = &outcome.sink_error {
        warn!(error = %e, "Report was not fully persisted");
    }
    Ok(exit_code(&outcome))
}
