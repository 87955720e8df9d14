//! Report upload to S3

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::info;

use fleetscan_common::model::AggregateReport;
use fleetscan_common::report::to_csv_bytes;
use fleetscan_common::{Error, Result};
use fleetscan_scan::{CredentialFederator, ReportSink};

use crate::config::scoped_config;

/// Role assumed for the upload instead of the base session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRole {
    /// Tenant owning the bucket
    pub tenant_id: String,
    /// Role with `s3:PutObject` on the bucket
    pub role_name: String,
}

/// Object key: `<prefix>/<stem>_<YYYYmmdd_HHMMSS><ext>`
pub fn object_key(prefix: &str, file_name: &str, stamp: DateTime<Utc>) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("fleetscan_report");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let name = format!("{stem}_{}{ext}", stamp.format("%Y%m%d_%H%M%S"));
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Uploads the CSV report to a bucket
pub struct S3Sink {
    base: SdkConfig,
    bucket: String,
    key: String,
    region: Option<String>,
    upload_role: Option<(UploadRole, Arc<dyn CredentialFederator>)>,
}

impl S3Sink {
    /// Sink uploading to `bucket` under a key derived from `file_name` and `stamp`
    pub fn new(
        base: SdkConfig,
        bucket: impl Into<String>,
        prefix: &str,
        file_name: &str,
        stamp: DateTime<Utc>,
    ) -> Self {
        Self {
            base,
            bucket: bucket.into(),
            key: object_key(prefix, file_name, stamp),
            region: None,
            upload_role: None,
        }
    }

    /// Bucket region, when it differs from the base session's
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Region the upload is sent to
    pub fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| self.base.region().map(|r| r.to_string()))
            .unwrap_or_else(|| crate::config::DEFAULT_HOME_REGION.to_string())
    }

    /// Upload through a dedicated role
    pub fn with_upload_role(mut self, role: UploadRole, federator: Arc<dyn CredentialFederator>) -> Self {
        self.upload_role = Some((role, federator));
        self
    }

    /// Destination as an `s3://` URL
    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    async fn client(&self) -> Result<aws_sdk_s3::Client> {
        let region = self.region();
        let Some((role, federator)) = &self.upload_role else {
            let config = self
                .base
                .to_builder()
                .region(aws_config::Region::new(region))
                .build();
            return Ok(aws_sdk_s3::Client::new(&config));
        };
        let credential = federator
            .acquire(&role.tenant_id, &role.role_name, &region)
            .await
            .map_err(|e| Error::sink("s3", format!("upload role unavailable: {e}")))?;
        Ok(aws_sdk_s3::Client::new(&scoped_config(&self.base, &credential)))
    }
}

#[async_trait]
impl ReportSink for S3Sink {
    fn name(&self) -> &str {
        "s3"
    }

    async fn persist(&self, report: &AggregateReport) -> Result<()> {
        let body = to_csv_bytes(report)?;
        let client = self.client().await?;
        client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("text/csv")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::sink("s3", crate::error::sdk_error("s3:PutObject", e).to_string()))?;
        info!(url = %self.url(), rows = report.total_rows, "Report uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_object_key_with_prefix() {
        assert_eq!(
            object_key("reports/eks/", "fleetscan_report_2024_06_01.csv", stamp()),
            "reports/eks/fleetscan_report_2024_06_01_20240601_090507.csv"
        );
    }

    #[test]
    fn test_object_key_without_prefix_or_extension() {
        assert_eq!(object_key("", "out/report", stamp()), "report_20240601_090507");
    }

    #[test]
    fn test_url() {
        let sink = S3Sink::new(
            SdkConfig::builder().build(),
            "audit-bucket",
            "reports",
            "r.csv",
            stamp(),
        );
        assert_eq!(sink.url(), "s3://audit-bucket/reports/r_20240601_090507.csv");
        assert_eq!(sink.name(), "s3");
    }

    /// Story: a bucket outside the base session's region is addressed in its
    /// own region; without an override the base region is used.
    #[test]
    fn story_upload_region_resolution() {
        let base = SdkConfig::builder()
            .region(aws_config::Region::new("us-east-1"))
            .build();
        let sink = S3Sink::new(base.clone(), "audit-bucket", "", "r.csv", stamp());
        assert_eq!(sink.region(), "us-east-1");

        let sink = S3Sink::new(base, "audit-bucket", "", "r.csv", stamp()).with_region("eu-west-1");
        assert_eq!(sink.region(), "eu-west-1");
    }

    #[test]
    fn test_upload_region_without_base_region() {
        let sink = S3Sink::new(SdkConfig::builder().build(), "b", "", "r.csv", stamp());
        assert_eq!(sink.region(), "us-east-1");
    }
}
