//! Audit configuration.
//!
//! Each setting resolves from (highest priority first):
//! 1. Command-line flag
//! 2. `FLEETSCAN_*` environment variable
//! 3. YAML config file given with `--config`
//! 4. Built-in default
//!
//! The result is validated once into an immutable [`AuditConfig`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde::Deserialize;

use fleetscan_aws::catalog::PROBE_MINORS;
use fleetscan_aws::UploadRole;
use fleetscan_common::telemetry::LogFormat;
use fleetscan_common::{ScanPolicy, DEFAULT_WORKER_COUNT, MAX_WORKER_COUNT};
use fleetscan_scan::collector::DEFAULT_READINESS_TIMEOUT;
use fleetscan_scan::executor::DEFAULT_GRACE_PERIOD;
use fleetscan_scan::planner::{validate_region, validate_tenant_id};

use crate::{Error, Result};

/// Console log format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatArg {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Settings shared by `scan` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct AuditArgs {
    /// YAML config file
    #[arg(long, env = "FLEETSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target list CSV (account_id, role_name, region)
    #[arg(long, short = 't', env = "FLEETSCAN_TARGETS")]
    pub targets: Option<PathBuf>,

    /// Concurrent scan workers (1-64)
    #[arg(long, short = 'w', env = "FLEETSCAN_WORKERS")]
    pub workers: Option<usize>,

    /// Scan these regions in every tenant instead of the listed ones
    #[arg(long, env = "FLEETSCAN_REGIONS", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Role used for rows that name none
    #[arg(long, env = "FLEETSCAN_DEFAULT_ROLE")]
    pub default_role: Option<String>,

    /// Image age in days above which a node is patch-pending
    #[arg(long, env = "FLEETSCAN_PATCH_AGE_DAYS")]
    pub patch_age_days: Option<i64>,

    /// Minor versions a cluster may trail the newest catalog version
    #[arg(long, env = "FLEETSCAN_VERSION_TOLERANCE")]
    pub version_tolerance: Option<u32>,

    /// Budget in seconds for one cluster readiness query
    #[arg(long, env = "FLEETSCAN_READINESS_TIMEOUT_SECS")]
    pub readiness_timeout_secs: Option<u64>,

    /// Seconds in-flight tasks may run after an interrupt
    #[arg(long, env = "FLEETSCAN_GRACE_SECS")]
    pub grace_secs: Option<u64>,

    /// Named profile for the base session
    #[arg(long, env = "FLEETSCAN_PROFILE")]
    pub profile: Option<String>,

    /// Local report path
    #[arg(long, short = 'o', env = "FLEETSCAN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Bucket to upload the report to
    #[arg(long, env = "FLEETSCAN_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix for the uploaded report
    #[arg(long, env = "FLEETSCAN_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Bucket region, when it differs from the base session's
    #[arg(long, env = "FLEETSCAN_S3_REGION")]
    pub s3_region: Option<String>,

    /// Write the local report only
    #[arg(long, env = "FLEETSCAN_SKIP_UPLOAD")]
    pub skip_upload: bool,

    /// Tenant owning the upload role
    #[arg(long, env = "FLEETSCAN_UPLOAD_ACCOUNT", requires = "upload_role")]
    pub upload_account: Option<String>,

    /// Role assumed for the upload
    #[arg(long, env = "FLEETSCAN_UPLOAD_ROLE", requires = "upload_account")]
    pub upload_role: Option<String>,

    /// Console log format
    #[arg(long, env = "FLEETSCAN_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormatArg>,
}

/// Upload section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Section {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
}

/// Upload role section of the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadRoleSection {
    pub account_id: String,
    pub role_name: String,
}

/// On-disk config file; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub targets: Option<PathBuf>,
    pub workers: Option<usize>,
    pub regions: Option<Vec<String>>,
    pub default_role: Option<String>,
    pub patch_age_threshold_days: Option<i64>,
    pub version_tolerance_minors: Option<u32>,
    pub readiness_timeout_secs: Option<u64>,
    pub grace_period_secs: Option<u64>,
    pub profile: Option<String>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub s3: S3Section,
    pub skip_upload: Option<bool>,
    pub upload_role: Option<UploadRoleSection>,
    #[serde(default)]
    pub tenant_names: BTreeMap<String, String>,
    pub log_format: Option<LogFormatArg>,
}

impl FileConfig {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&data).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Where to upload the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub prefix: String,
    pub region: Option<String>,
    pub role: Option<UploadRole>,
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub targets: PathBuf,
    pub worker_count: usize,
    pub regions: Option<Vec<String>>,
    pub default_role: Option<String>,
    pub policy: ScanPolicy,
    pub readiness_timeout: Duration,
    pub grace_period: Duration,
    pub profile: Option<String>,
    pub output: PathBuf,
    pub upload: Option<UploadTarget>,
    pub tenant_names: HashMap<String, String>,
    pub log_format: LogFormat,
}

/// Local report name for `date`
pub fn default_output(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("fleetscan_report_{}.csv", date.format("%Y_%m_%d")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AuditConfig {
    /// Resolve from flags/env and the optional config file
    pub fn resolve(args: &AuditArgs, today: NaiveDate) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file, today)
    }

    /// Layer flags/env over `file` over defaults and validate
    pub fn merge(args: &AuditArgs, file: FileConfig, today: NaiveDate) -> Result<Self> {
        let targets = args
            .targets
            .clone()
            .or(file.targets)
            .ok_or_else(|| Error::config("no target list given (--targets or FLEETSCAN_TARGETS)"))?;

        let worker_count = args.workers.or(file.workers).unwrap_or(DEFAULT_WORKER_COUNT);
        if !(1..=MAX_WORKER_COUNT).contains(&worker_count) {
            return Err(Error::config(format!(
                "workers must be between 1 and {MAX_WORKER_COUNT}, got {worker_count}"
            )));
        }

        let regions = if args.regions.is_empty() {
            file.regions
        } else {
            Some(args.regions.clone())
        };
        let regions = regions
            .map(|r| {
                r.into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|r| !r.is_empty());
        if let Some(regions) = &regions {
            for region in regions {
                validate_region(region).map_err(Error::config)?;
            }
        }

        let defaults = ScanPolicy::default();
        let policy = ScanPolicy {
            patch_age_threshold_days: args
                .patch_age_days
                .or(file.patch_age_threshold_days)
                .unwrap_or(defaults.patch_age_threshold_days),
            version_tolerance_minors: args
                .version_tolerance
                .or(file.version_tolerance_minors)
                .unwrap_or(defaults.version_tolerance_minors),
        };
        if policy.patch_age_threshold_days < 0 {
            return Err(Error::config("patch age threshold must not be negative"));
        }
        // Catalog probing only reaches PROBE_MINORS above the cluster.
        if policy.version_tolerance_minors >= PROBE_MINORS {
            return Err(Error::config(format!(
                "version tolerance must be below {PROBE_MINORS} minors, got {}",
                policy.version_tolerance_minors
            )));
        }

        let readiness_timeout = args
            .readiness_timeout_secs
            .or(file.readiness_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READINESS_TIMEOUT);
        if readiness_timeout.is_zero() {
            return Err(Error::config("readiness timeout must be positive"));
        }
        let grace_period = args
            .grace_secs
            .or(file.grace_period_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GRACE_PERIOD);

        let skip_upload = args.skip_upload || file.skip_upload.unwrap_or(false);
        let upload_role = match (non_empty(args.upload_account.clone()), non_empty(args.upload_role.clone())) {
            (Some(tenant_id), Some(role_name)) => Some(UploadRole { tenant_id, role_name }),
            _ => file.upload_role.map(|r| UploadRole {
                tenant_id: r.account_id,
                role_name: r.role_name,
            }),
        };
        if let Some(role) = &upload_role {
            validate_tenant_id(&role.tenant_id).map_err(Error::config)?;
        }
        let bucket = non_empty(args.s3_bucket.clone()).or(non_empty(file.s3.bucket));
        let s3_region = non_empty(args.s3_region.clone()).or(non_empty(file.s3.region));
        if let Some(region) = &s3_region {
            validate_region(region).map_err(Error::config)?;
        }
        let upload = match bucket {
            Some(bucket) if !skip_upload => Some(UploadTarget {
                bucket,
                prefix: args
                    .s3_prefix
                    .clone()
                    .or(file.s3.prefix)
                    .unwrap_or_default(),
                region: s3_region,
                role: upload_role,
            }),
            _ => None,
        };

        Ok(Self {
            targets,
            worker_count,
            regions,
            default_role: non_empty(args.default_role.clone()).or(non_empty(file.default_role)),
            policy,
            readiness_timeout,
            grace_period,
            profile: non_empty(args.profile.clone()).or(non_empty(file.profile)),
            output: args
                .output
                .clone()
                .or(file.output)
                .unwrap_or_else(|| default_output(today)),
            upload,
            tenant_names: file.tenant_names.into_iter().collect(),
            log_format: args.log_format.or(file.log_format).map(Into::into).unwrap_or_default(),
        })
    }
}
