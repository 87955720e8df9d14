//! Table output for run summaries and plans

use fleetscan_common::model::{AggregateReport, ScanTask};
use fleetscan_scan::planner::Rejection;

/// Render rows as a column-aligned table with headers
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let num_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(num_cols) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// Print a table to stdout
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

/// Totals line and one row per failed task
pub fn summary_tables(report: &AggregateReport) -> (String, Option<String>) {
    let totals = render_table(
        &["TASKS", "SUCCEEDED", "FAILED", "ROWS"],
        &[vec![
            report.total_tasks.to_string(),
            report.successes.to_string(),
            report.failures.to_string(),
            report.total_rows.to_string(),
        ]],
    );
    if report.failed.is_empty() {
        return (totals, None);
    }
    let rows: Vec<Vec<String>> = report
        .failed
        .iter()
        .map(|f| {
            vec![
                f.task.tenant_id.clone(),
                f.task.region.clone(),
                f.detail.category.to_string(),
                f.detail.message.clone(),
            ]
        })
        .collect();
    (
        totals,
        Some(render_table(&["TENANT", "REGION", "CATEGORY", "DETAIL"], &rows)),
    )
}

/// Print the end-of-run summary
pub fn print_summary(report: &AggregateReport) {
    let (totals, failures) = summary_tables(report);
    println!("{totals}");
    if let Some(failures) = failures {
        println!();
        println!("{failures}");
    }
}

/// Print planned tasks and rejected entries
pub fn print_plan(tasks: &[ScanTask], rejected: &[Rejection]) {
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| vec![t.tenant_id.clone(), t.region.clone(), t.role_name.clone()])
        .collect();
    print_table(&["TENANT", "REGION", "ROLE"], &rows);

    if !rejected.is_empty() {
        let rows: Vec<Vec<String>> = rejected
            .iter()
            .map(|r| {
                vec![
                    r.tenant_id.clone(),
                    r.region.clone().unwrap_or_else(|| "-".to_string()),
                    r.reason.clone(),
                ]
            })
            .collect();
        println!();
        print_table(&["REJECTED", "REGION", "REASON"], &rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscan_common::model::FailedTask;
    use fleetscan_common::{classify, Error};

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["NAME", "STATUS"],
            &[
                vec!["a".to_string(), "Ready".to_string()],
                vec!["longer-name".to_string(), "x".to_string()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "NAME         STATUS");
        assert_eq!(lines[1], "a            Ready");
        assert_eq!(lines[2], "longer-name  x");
    }

    #[test]
    fn test_render_table_headers_only() {
        assert_eq!(render_table(&["A", "B"], &[]), "A  B");
    }

    #[test]
    fn test_summary_lists_failures() {
        let report = AggregateReport {
            total_tasks: 2,
            successes: 1,
            failures: 1,
            failed: vec![FailedTask {
                task: ScanTask::new("123456789012", "us-east-1", "Audit"),
                detail: classify(&Error::federation(
                    "123456789012",
                    "Audit",
                    Some("AccessDenied".to_string()),
                    "not authorized",
                )),
            }],
            ..Default::default()
        };
        let (totals, failures) = summary_tables(&report);
        assert!(totals.lines().nth(1).unwrap().starts_with("2      1"));
        let failures = failures.unwrap();
        assert!(failures.contains("123456789012"));
        assert!(failures.contains("AccessDenied"));
    }
}
