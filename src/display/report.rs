//! Download summary formatting
//!
//! Renders a [`DownloadReport`] as a short block of counts followed by a table
//! of the exported files and any forms or records that need attention.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::{DownloadError, FailureReason};
use crate::services::DownloadReport;

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Form")]
    form: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Columns")]
    columns: usize,
}

#[derive(Tabled)]
struct UnresolvedRow {
    #[tabled(rename = "Form")]
    form: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Format a download report for the terminal
pub fn format_report(report: &DownloadReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Records: {} retrieved, {} exported\n",
        report.record_count, report.exported_count
    ));

    if report.tables.is_empty() {
        output.push_str("No tables were written.\n");
    } else {
        let rows = report.tables.iter().map(|t| TableRow {
            file: t.file_name.clone(),
            form: t.form_key.to_string(),
            rows: t.rows,
            columns: t.columns,
        });
        output.push_str(&Table::new(rows).with(Style::psql()).to_string());
        output.push('\n');
    }

    if !report.skipped_pages.is_empty() {
        let pages: Vec<String> = report
            .skipped_pages
            .iter()
            .map(|p| p.page.to_string())
            .collect();
        output.push_str(&format!("\nSkipped ledger pages: {}\n", pages.join(", ")));
    }

    if !report.decryption_failures.is_empty() {
        output.push_str(&format!(
            "\nCould not decrypt {} record(s):\n",
            report.decryption_failures.len()
        ));
        for uuid in &report.decryption_failures {
            output.push_str(&format!("  {}\n", uuid));
        }
    }

    if !report.unresolved_forms.is_empty() {
        output.push_str("\nForm definitions not available:\n");
        let rows = report.unresolved_forms.iter().map(|(key, reason)| UnresolvedRow {
            form: key.to_string(),
            reason: reason.to_string(),
        });
        output.push_str(&Table::new(rows).with(Style::psql()).to_string());
        output.push('\n');

        let denied = report
            .unresolved_forms
            .iter()
            .find(|(_, reason)| *reason == FailureReason::Unauthorized);
        if let Some((key, reason)) = denied {
            let err = DownloadError::Resolve {
                key: key.clone(),
                reason: *reason,
            };
            output.push_str(&format!("{}\n", err.user_message()));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormKey;
    use crate::services::TableSummary;

    fn report() -> DownloadReport {
        DownloadReport {
            archive: Vec::new(),
            record_count: 3,
            exported_count: 2,
            decryption_failures: vec!["r2".into()],
            unresolved_forms: vec![(FormKey::new("urn:sleep", "3"), FailureReason::Unauthorized)],
            skipped_pages: Vec::new(),
            tables: vec![TableSummary {
                file_name: "mood.csv".into(),
                form_key: FormKey::new("urn:mood", "1"),
                rows: 2,
                columns: 7,
            }],
            reconciled: Vec::new(),
        }
    }

    #[test]
    fn test_summary_mentions_everything() {
        let text = format_report(&report());

        assert!(text.contains("3 retrieved, 2 exported"));
        assert!(text.contains("mood.csv"));
        assert!(text.contains("urn:mood|1"));
        assert!(text.contains("r2"));
        assert!(text.contains("Unauthorized"));
        assert!(text.contains("You are not authorized to download this data."));
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn test_other_failures_do_not_mention_authorization() {
        let mut report = report();
        report.unresolved_forms = vec![(FormKey::new("urn:sleep", "3"), FailureReason::NotFound)];

        let text = format_report(&report);
        assert!(text.contains("Not Found"));
        assert!(!text.contains("not authorized"));
    }

    #[test]
    fn test_empty_report() {
        let mut report = report();
        report.tables.clear();
        report.decryption_failures.clear();
        report.unresolved_forms.clear();

        let text = format_report(&report);
        assert!(text.contains("No tables were written."));
    }
}
