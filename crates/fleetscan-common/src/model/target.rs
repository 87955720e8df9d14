//! Scan targets and tasks

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One tenant and the regions to scan in it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantTarget {
    /// 12-digit tenant (account) id
    pub tenant_id: String,
    /// Role to federate into
    pub role_name: String,
    /// Region codes to scan
    pub regions: BTreeSet<String>,
}

impl TenantTarget {
    /// Build a target from any iterator of region codes
    pub fn new<I, S>(tenant_id: impl Into<String>, role_name: impl Into<String>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tenant_id: tenant_id.into(),
            role_name: role_name.into(),
            regions: regions.into_iter().map(Into::into).collect(),
        }
    }
}

/// One (tenant, region) unit of concurrent work.
///
/// Ordering is by tenant, then region; the role does not take part in
/// identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanTask {
    /// Tenant id
    pub tenant_id: String,
    /// Region code
    pub region: String,
    /// Role to federate into
    pub role_name: String,
}

impl ScanTask {
    /// Create a task
    pub fn new(
        tenant_id: impl Into<String>,
        region: impl Into<String>,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            region: region.into(),
            role_name: role_name.into(),
        }
    }

    fn key(&self) -> (&str, &str) {
        (&self.tenant_id, &self.region)
    }
}

impl PartialEq for ScanTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScanTask {}

impl PartialOrd for ScanTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScanTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ScanTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.region)
    }
}
