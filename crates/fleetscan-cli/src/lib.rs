//! fleetscan CLI library

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod targets;

pub use error::{Error, Result};

use chrono::Utc;
use clap::{Parser, Subcommand};

use config::{AuditArgs, AuditConfig};

/// fleetscan - node image compliance audit across tenants and regions
#[derive(Parser, Debug)]
#[command(name = "fleetscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan every tenant/region and write the compliance report
    Scan(AuditArgs),
    /// Print the tasks a scan would run, without scanning
    Plan(AuditArgs),
}

impl Cli {
    /// Settings given to the selected command
    pub fn args(&self) -> &AuditArgs {
        match &self.command {
            Commands::Scan(args) | Commands::Plan(args) => args,
        }
    }

    /// Resolve and validate the run configuration
    pub fn resolve_config(&self) -> Result<AuditConfig> {
        AuditConfig::resolve(self.args(), Utc::now().date_naive())
    }

    /// Run the CLI command, returning the process exit code
    pub async fn run(self, config: AuditConfig) -> Result<u8> {
        match self.command {
            Commands::Scan(_) => commands::scan::run(&config).await,
            Commands::Plan(_) => commands::plan::run(&config),
        }
    }
}
