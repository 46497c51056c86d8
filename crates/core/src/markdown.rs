use crate::model::CaseSummary;

pub fn render_markdown_summary(summary: &CaseSummary) -> String {
    let mut out = String::new();
    out.push_str("# Case Scan Summary\n\n");
    out.push_str(&format!(
        "- Summary version: `{}`\n- Generated at: `{}`\n- Scan id: `{}`\n- Directory: `{}`\n- Files scanned: `{}`\n- Scan elapsed: `{} ms`\n\n",
        summary.summary_version,
        summary.generated_at,
        summary.scan_id,
        summary.scan.directory,
        summary.files_scanned,
        summary.scan_metrics.elapsed_ms
    ));

    out.push_str("## Files By Kind\n\n");
    if summary.files_by_kind.is_empty() {
        out.push_str("No files scanned.\n\n");
    } else {
        for (kind, count) in &summary.files_by_kind {
            out.push_str(&format!("- `{kind}`: {count} file(s)\n"));
        }
        out.push('\n');
    }

    out.push_str("## Dataset Analysis\n\n");
    if summary.dataset_summaries.is_empty() {
        out.push_str("No tabular datasets found.\n\n");
    } else {
        for dataset in &summary.dataset_summaries {
            out.push_str(&format!(
                "### `{}`\n\n- Rows: {}\n- Columns: {}\n- Missing cells: {}\n",
                dataset.path, dataset.row_count, dataset.column_count, dataset.missing_cells
            ));
            if let Some(error) = &dataset.error {
                out.push_str(&format!("- Load error: {error}\n"));
            }
            if let Some(labels) = &dataset.label_distribution {
                out.push_str("- Label distribution:\n");
                for (label, count) in labels {
                    out.push_str(&format!("  - `{label}`: {count}\n"));
                }
            }
            if !dataset.rule_hits.is_empty() {
                out.push_str("- Suspicious activity:\n");
                for hit in &dataset.rule_hits {
                    out.push_str(&format!("  - {}\n", hit.description));
                }
            }
            out.push('\n');
        }
    }

    out.push_str("## Suspicious Activity\n\n");
    if summary.rule_hit_details.is_empty() {
        out.push_str("No rules matched.\n\n");
    } else {
        out.push_str(&format!(
            "Total matched rows: {}\n\n",
            summary.total_rule_hits
        ));
        for hit in &summary.rule_hit_details {
            out.push_str(&format!("- `{}`: {}\n", hit.rule_id, hit.description));
        }
        out.push('\n');
    }

    out.push_str("## Extraction Errors\n\n");
    let failed: Vec<_> = summary
        .files
        .iter()
        .filter(|record| record.extraction_error.is_some())
        .collect();
    if failed.is_empty() {
        out.push_str("None.\n\n");
    } else {
        for record in failed {
            if let Some(error) = &record.extraction_error {
                out.push_str(&format!("- `{}`: {}\n", record.path, error));
            }
        }
        out.push('\n');
    }

    out.push_str("## Warnings\n\n");
    if summary.warnings.is_empty() {
        out.push_str("None.\n");
    } else {
        for warning in &summary.warnings {
            out.push_str(&format!("- {warning}\n"));
        }
    }

    out
}
