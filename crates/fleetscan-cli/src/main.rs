//! fleetscan CLI
//!
//! Audits running Kubernetes worker nodes across tenants and regions for
//! image patch currency and platform version compliance.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use fleetscan_cli::{Cli, Error};
use fleetscan_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let _guard = match init_telemetry(TelemetryConfig {
        log_format: config.log_format,
        ..TelemetryConfig::default()
    }) {
        Ok(guard) => guard,
        Err(e) => {
            let e = Error::from(e);
            eprintln!("error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match cli.run(config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "fleetscan failed");
            ExitCode::from(e.exit_code())
        }
    }
}
