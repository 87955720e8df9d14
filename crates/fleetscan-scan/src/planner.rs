//! Scan planning: expand tenants × regions into validated, deduplicated tasks

use std::collections::BTreeMap;

use tracing::{debug, warn};

use fleetscan_common::model::{ScanTask, TenantTarget};

/// Why a target entry was not planned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// Tenant id as given
    pub tenant_id: String,
    /// Region as given, if the rejection is region-specific
    pub region: Option<String>,
    /// Human-readable reason
    pub reason: String,
}

/// Output of planning
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanPlan {
    /// Tasks sorted by tenant, then region
    pub tasks: Vec<ScanTask>,
    /// Entries that failed validation
    pub rejected: Vec<Rejection>,
}

/// Check that a tenant id is exactly 12 ASCII digits
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), String> {
    if tenant_id.len() == 12 && tenant_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(format!("tenant id '{tenant_id}' must be 12 digits"))
    }
}

/// Check that a region looks like `us-east-1` / `us-gov-west-1`
pub fn validate_region(region: &str) -> Result<(), String> {
    let parts: Vec<&str> = region.split('-').collect();
    let well_formed = parts.len() >= 3
        && parts[..parts.len() - 1]
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_lowercase()))
        && parts[parts.len() - 1]
            .bytes()
            .all(|b| b.is_ascii_digit())
        && !parts[parts.len() - 1].is_empty();
    if well_formed {
        Ok(())
    } else {
        Err(format!("region '{region}' is not a valid region code"))
    }
}

/// Expand targets into tasks.
///
/// When `region_override` is set it replaces every target's own regions.
/// Duplicate (tenant, region) pairs keep the first role seen.
pub fn plan(targets: &[TenantTarget], region_override: Option<&[String]>) -> ScanPlan {
    let mut tasks: BTreeMap<(String, String), ScanTask> = BTreeMap::new();
    let mut rejected = Vec::new();

    for target in targets {
        if let Err(reason) = validate_tenant_id(&target.tenant_id) {
            rejected.push(Rejection {
                tenant_id: target.tenant_id.clone(),
                region: None,
                reason,
            });
            continue;
        }
        let role = target.role_name.trim();
        if role.is_empty() {
            rejected.push(Rejection {
                tenant_id: target.tenant_id.clone(),
                region: None,
                reason: "role name is empty".to_string(),
            });
            continue;
        }

        let regions: Vec<&str> = match region_override {
            Some(fixed) => fixed.iter().map(String::as_str).collect(),
            None => target.regions.iter().map(String::as_str).collect(),
        };
        if regions.is_empty() {
            rejected.push(Rejection {
                tenant_id: target.tenant_id.clone(),
                region: None,
                reason: "no regions to scan".to_string(),
            });
            continue;
        }

        for region in regions {
            if let Err(reason) = validate_region(region) {
                rejected.push(Rejection {
                    tenant_id: target.tenant_id.clone(),
                    region: Some(region.to_string()),
                    reason,
                });
                continue;
            }

            let key = (target.tenant_id.clone(), region.to_string());
            match tasks.get(&key) {
                Some(existing) if existing.role_name != role => {
                    warn!(
                        tenant = %target.tenant_id,
                        region = %region,
                        kept_role = %existing.role_name,
                        ignored_role = %role,
                        "Duplicate target with a different role; keeping the first"
                    );
                }
                Some(_) => {}
                None => {
                    tasks.insert(key, ScanTask::new(&target.tenant_id, region, role));
                }
            }
        }
    }

    for r in &rejected {
        warn!(
            tenant = %r.tenant_id,
            region = r.region.as_deref().unwrap_or("-"),
            reason = %r.reason,
            "Rejected scan target"
        );
    }

    let tasks: Vec<ScanTask> = tasks.into_values().collect();
    debug!(tasks = tasks.len(), rejected = rejected.len(), "Scan plan built");
    ScanPlan { tasks, rejected }
}
