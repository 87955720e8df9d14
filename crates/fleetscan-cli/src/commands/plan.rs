//! `fleetscan plan`: show the task list without scanning

use crate::config::AuditConfig;
use crate::error::EXIT_OK;
use crate::format::print_plan;
use crate::Result;

use super::plan_from_config;

/// Print the tasks a scan would run
pub fn run(config: &AuditConfig) -> Result<u8> {
    let planned = plan_from_config(config)?;
    print_plan(&planned.tasks, &planned.rejected);
    Ok(EXIT_OK)
}
