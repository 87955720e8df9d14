//! CSV rendering of the aggregate report
//!
//! Column order is fixed. Unknown values render as `N/A`, booleans as
//! `True`/`False`.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{AggregateReport, EnrichedNodeRow};
use crate::{Result, NOT_AVAILABLE};

/// Report columns, in output order
pub const REPORT_HEADERS: [&str; 19] = [
    "tenant_id",
    "tenant_name",
    "region",
    "cluster_name",
    "cluster_version",
    "instance_id",
    "current_image_id",
    "current_image_publication_date",
    "image_age_days",
    "os_family",
    "instance_class",
    "node_state",
    "node_uptime",
    "latest_image_id",
    "latest_image_publication_date",
    "patch_pending",
    "node_readiness",
    "version_compliance",
    "audit_timestamp",
];

/// Render a date as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Render an instant as `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render an uptime as `<d> days <h> hours`
pub fn format_uptime(uptime: chrono::Duration) -> String {
    let days = uptime.num_days();
    let hours = uptime.num_hours() - days * 24;
    format!("{days} days {hours} hours")
}

fn format_bool(value: bool) -> String {
    let s = if value { "True" } else { "False" };
    s.to_string()
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Render one row as CSV fields, in [`REPORT_HEADERS`] order
pub fn render_row(row: &EnrichedNodeRow) -> Vec<String> {
    vec![
        row.tenant_id.clone(),
        row.tenant_name.clone(),
        row.region.clone(),
        row.cluster_name.clone(),
        or_na(row.cluster_version.as_deref()),
        or_na(row.instance_id.as_deref()),
        or_na(row.current_image_id.as_deref()),
        or_na(row.current_image_publication_date.map(format_date)),
        or_na(row.image_age_days),
        or_na(row.os_family),
        or_na(row.instance_class.as_deref()),
        or_na(row.node_state.as_deref()),
        or_na(row.node_uptime.as_deref()),
        or_na(row.latest_image_id.as_deref()),
        or_na(row.latest_image_publication_date.map(format_date)),
        format_bool(row.patch_pending),
        or_na(row.node_readiness),
        format_bool(row.version_compliance),
        format_timestamp(row.audit_timestamp),
    ]
}

/// Write the report (header plus one line per row) to `writer`
pub fn write_csv<W: Write>(report: &AggregateReport, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(REPORT_HEADERS)?;
    for row in &report.rows {
        csv.write_record(render_row(row))?;
    }
    csv.flush()
        .map_err(|e| crate::Error::io("flushing csv report", e))?;
    Ok(())
}

/// Render the report into an in-memory CSV document
pub fn to_csv_bytes(report: &AggregateReport) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(report, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OsFamily, Readiness};
    use chrono::TimeZone;

    fn row() -> EnrichedNodeRow {
        EnrichedNodeRow {
            tenant_id: "123456789012".to_string(),
            tenant_name: "payments-prod".to_string(),
            region: "us-east-1".to_string(),
            cluster_name: "core".to_string(),
            cluster_version: Some("1.29".to_string()),
            instance_id: Some("i-0abc".to_string()),
            current_image_id: Some("ami-111".to_string()),
            current_image_publication_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            image_age_days: Some(61),
            os_family: Some(OsFamily::AmazonLinux2),
            instance_class: Some("m5.large".to_string()),
            node_state: Some("running".to_string()),
            node_uptime: Some("3 days 4 hours".to_string()),
            latest_image_id: None,
            latest_image_publication_date: None,
            patch_pending: true,
            node_readiness: Some(Readiness::Ready),
            version_compliance: false,
            audit_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_row_follows_header_order() {
        let fields = render_row(&row());
        assert_eq!(fields.len(), REPORT_HEADERS.len());
        assert_eq!(fields[7], "2024-03-01");
        assert_eq!(fields[9], "Amazon Linux 2");
        assert_eq!(fields[13], "N/A");
        assert_eq!(fields[15], "True");
        assert_eq!(fields[16], "Ready");
        assert_eq!(fields[17], "False");
        assert_eq!(fields[18], "2024-05-01 09:30:00");
    }

    /// Story: a run where every task failed still produces a report file
    /// with just the header.
    #[test]
    fn story_empty_report_has_header_only() {
        let bytes = to_csv_bytes(&AggregateReport::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("tenant_id,tenant_name,region,cluster_name"));
        assert!(text.trim_end().ends_with("audit_timestamp"));
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(chrono::Duration::hours(52)), "2 days 4 hours");
        assert_eq!(format_uptime(chrono::Duration::minutes(59)), "0 days 0 hours");
    }
}
