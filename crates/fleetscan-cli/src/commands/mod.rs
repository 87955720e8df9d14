//! CLI commands

use tracing::warn;

use fleetscan_scan::{plan, ScanPlan};

use crate::config::AuditConfig;
use crate::targets::load_targets;
use crate::Result;

pub mod plan;
pub mod scan;

/// Ingest the target list and expand it into tasks
pub fn plan_from_config(config: &AuditConfig) -> Result<ScanPlan> {
    let targets = load_targets(&config.targets, config.default_role.as_deref())?;
    let planned = plan(&targets, config.regions.as_deref());
    if !planned.rejected.is_empty() {
        warn!(
            rejected = planned.rejected.len(),
            "Some target entries were rejected"
        );
    }
    Ok(planned)
}
