//! Error types for the CLI

use std::path::PathBuf;

use fleetscan_common::telemetry::TelemetryError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Every task succeeded and the report was persisted
pub const EXIT_OK: u8 = 0;
/// Configuration, ingestion or persistence problem
pub const EXIT_CONFIG: u8 = 1;
/// At least one task failed
pub const EXIT_TASK_FAILURES: u8 = 2;
/// Interrupted by the operator
pub const EXIT_INTERRUPTED: u8 = 130;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] fleetscan_common::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("target list {path}: {message}")]
    Targets { path: PathBuf, message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn targets(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Targets {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        EXIT_CONFIG
    }
}
