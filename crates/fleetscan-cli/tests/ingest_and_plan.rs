//! Target list ingestion through planning, via the public API

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use fleetscan_cli::commands::plan_from_config;
use fleetscan_cli::config::{AuditArgs, AuditConfig, FileConfig};
use fleetscan_cli::targets::load_targets;
use fleetscan_cli::{Cli, Commands};
use fleetscan_scan::plan;

const TARGETS: &str = "\
account_id,role_name,region
123456789012,Audit,\"us-east-1,eu-west-1\"
210987654321,,us-west-2
123456789012,OtherRole,us-east-1
99999,Audit,us-east-1
";

fn write_targets(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("targets.csv");
    std::fs::write(&path, TARGETS).unwrap();
    path
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// Story: an operator's target list with a duplicate, a role-less row and a
/// malformed tenant id becomes a sorted, deduplicated task list.
#[test]
fn story_target_list_to_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_targets(&dir);

    let targets = load_targets(&path, Some("FleetAudit")).unwrap();
    assert_eq!(targets.len(), 4);

    let planned = plan(&targets, None);
    let pairs: Vec<(&str, &str, &str)> = planned
        .tasks
        .iter()
        .map(|t| (t.tenant_id.as_str(), t.region.as_str(), t.role_name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("123456789012", "eu-west-1", "Audit"),
            ("123456789012", "us-east-1", "Audit"),
            ("210987654321", "us-west-2", "FleetAudit"),
        ]
    );
    assert_eq!(planned.rejected.len(), 1);
    assert_eq!(planned.rejected[0].tenant_id, "99999");
}

#[test]
fn test_region_override_applies_to_every_tenant() {
    let dir = tempfile::tempdir().unwrap();
    let args = AuditArgs {
        targets: Some(write_targets(&dir)),
        regions: vec!["ap-south-1".to_string()],
        default_role: Some("FleetAudit".to_string()),
        ..Default::default()
    };
    let config = AuditConfig::merge(&args, FileConfig::default(), today()).unwrap();

    let planned = plan_from_config(&config).unwrap();
    assert_eq!(planned.tasks.len(), 2);
    assert!(planned.tasks.iter().all(|t| t.region == "ap-south-1"));
}

#[test]
fn test_row_without_role_dropped_when_no_default() {
    let dir = tempfile::tempdir().unwrap();
    let args = AuditArgs {
        targets: Some(write_targets(&dir)),
        ..Default::default()
    };
    let config = AuditConfig::merge(&args, FileConfig::default(), today()).unwrap();

    let planned = plan_from_config(&config).unwrap();
    assert!(planned.tasks.iter().all(|t| t.tenant_id != "210987654321"));
}

#[test]
fn test_cli_parses_plan_subcommand() {
    let cli = Cli::try_parse_from([
        "fleetscan",
        "plan",
        "--targets",
        "targets.csv",
        "--workers",
        "8",
        "--regions",
        "us-east-1,eu-west-1",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Plan(_)));
    let args = cli.args();
    assert_eq!(args.workers, Some(8));
    assert_eq!(args.regions, vec!["us-east-1".to_string(), "eu-west-1".to_string()]);
}

#[test]
fn test_upload_role_flags_require_each_other() {
    let result = Cli::try_parse_from([
        "fleetscan",
        "scan",
        "--targets",
        "t.csv",
        "--upload-role",
        "ReportWriter",
    ]);
    assert!(result.is_err());
}
