//! Target list ingestion
//!
//! The list is a CSV with a header row naming `account_id` (or `tenant_id`),
//! `role_name` and `region`. A region cell may hold several comma-separated
//! codes. Column order and extra columns do not matter.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{error, info, warn};

use fleetscan_common::model::TenantTarget;

use crate::{Error, Result};

const TENANT_COLUMNS: &[&str] = &["account_id", "tenant_id"];
const ROLE_COLUMN: &str = "role_name";
const REGION_COLUMN: &str = "region";

struct Columns {
    tenant: usize,
    role: usize,
    region: usize,
}

fn locate_columns(headers: &StringRecord) -> std::result::Result<Columns, String> {
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let tenant = find(TENANT_COLUMNS).ok_or("missing column account_id (or tenant_id)")?;
    let role = find(&[ROLE_COLUMN]).ok_or("missing column role_name")?;
    let region = find(&[REGION_COLUMN]).ok_or("missing column region")?;
    Ok(Columns {
        tenant,
        role,
        region,
    })
}

/// Split a region cell into codes
pub fn split_regions(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a target list. `source` names the input in errors.
pub fn parse_targets<R: Read>(
    reader: R,
    source: &Path,
    default_role: Option<&str>,
) -> Result<Vec<TenantTarget>> {
    let mut csv = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv.headers()?.clone();
    let columns = locate_columns(&headers).map_err(|m| Error::targets(source, m))?;

    let mut targets = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        let line = index + 2;
        let tenant_id = record.get(columns.tenant).unwrap_or_default();
        if tenant_id.is_empty() {
            warn!(line, "Skipping row without a tenant id");
            continue;
        }

        let role = match record.get(columns.role).filter(|r| !r.is_empty()) {
            Some(role) => role,
            None => match default_role {
                Some(role) => role,
                None => {
                    error!(line, tenant = %tenant_id, "Row has no role and no default role is configured; skipping");
                    continue;
                }
            },
        };

        let regions = split_regions(record.get(columns.region).unwrap_or_default());
        targets.push(TenantTarget::new(tenant_id, role, regions));
    }

    info!(path = %source.display(), targets = targets.len(), "Loaded target list");
    Ok(targets)
}

/// Read a target list from disk
pub fn load_targets(path: &Path, default_role: Option<&str>) -> Result<Vec<TenantTarget>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::targets(path, format!("cannot open: {e}")))?;
    parse_targets(file, path, default_role)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str, default_role: Option<&str>) -> Result<Vec<TenantTarget>> {
        parse_targets(data.as_bytes(), Path::new("targets.csv"), default_role)
    }

    #[test]
    fn test_region_cell_expands() {
        let targets = parse(
            "account_id,role_name,region\n123456789012,Audit,\"us-east-1, eu-west-1\"\n",
            None,
        )
        .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(
            targets[0].regions.iter().cloned().collect::<Vec<_>>(),
            vec!["eu-west-1".to_string(), "us-east-1".to_string()]
        );
    }

    #[test]
    fn test_tenant_id_header_and_column_order() {
        let targets = parse(
            "region,notes,Tenant_ID,role_name\nus-west-2,prod,123456789012,Audit\n",
            None,
        )
        .unwrap();
        assert_eq!(targets[0].tenant_id, "123456789012");
        assert_eq!(targets[0].role_name, "Audit");
    }

    /// Story: a row without a role uses the configured default; without a
    /// default the row is dropped and the rest of the list still loads.
    #[test]
    fn story_empty_role_falls_back_to_default() {
        let data = "account_id,role_name,region\n123456789012,,us-east-1\n210987654321,Audit,us-east-1\n";

        let with_default = parse(data, Some("FleetAudit")).unwrap();
        assert_eq!(with_default.len(), 2);
        assert_eq!(with_default[0].role_name, "FleetAudit");

        let without_default = parse(data, None).unwrap();
        assert_eq!(without_default.len(), 1);
        assert_eq!(without_default[0].tenant_id, "210987654321");
    }

    #[test]
    fn test_missing_column_is_hard_error() {
        let err = parse("account_id,region\n123456789012,us-east-1\n", None).unwrap_err();
        assert!(err.to_string().contains("role_name"));
    }

    #[test]
    fn test_blank_tenant_skipped() {
        let targets = parse("account_id,role_name,region\n,Audit,us-east-1\n", None).unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.csv");
        std::fs::write(&path, "account_id,role_name,region\n123456789012,Audit,us-east-1\n").unwrap();
        assert_eq!(load_targets(&path, None).unwrap().len(), 1);
        assert!(load_targets(&dir.path().join("missing.csv"), None).is_err());
    }
}
