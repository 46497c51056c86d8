use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

use crate::model::{
    CaseSummary, DatasetSummary, FileKind, FileRecord, RuleHit, ScanMetadata, ScanMetrics,
    ScanProgressSummary, SUMMARY_VERSION,
};

/// Everything the aggregation step needs; produced by the scan pipeline.
#[derive(Debug)]
pub struct AggregateInput {
    pub scan_id: String,
    pub scan: ScanMetadata,
    pub scan_metrics: ScanMetrics,
    pub scan_progress_summary: ScanProgressSummary,
    pub files: Vec<FileRecord>,
    pub dataset_summaries: Vec<DatasetSummary>,
    pub warnings: Vec<String>,
}

/// Fold per-file records and per-dataset analyses into the final summary.
/// Pure: no I/O, no mutation of the inputs beyond moving them. Every record
/// contributes exactly one entry to `files` and one count to
/// `files_by_kind`; `total_rule_hits` is the sum of matched rows over every
/// dataset.
pub fn aggregate(input: AggregateInput) -> CaseSummary {
    let mut files_by_kind: BTreeMap<FileKind, u64> = BTreeMap::new();
    for record in &input.files {
        *files_by_kind.entry(record.kind).or_insert(0) += 1;
    }

    let rule_hit_details: Vec<RuleHit> = input
        .dataset_summaries
        .iter()
        .flat_map(|summary| summary.rule_hits.iter().cloned())
        .collect();
    let total_rule_hits = rule_hit_details
        .iter()
        .map(|hit| hit.matched_row_count)
        .sum();

    CaseSummary {
        summary_version: SUMMARY_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        scan_id: input.scan_id,
        scan: input.scan,
        scan_metrics: input.scan_metrics,
        scan_progress_summary: input.scan_progress_summary,
        files_scanned: input.files.len() as u64,
        files_by_kind,
        dataset_summaries: input.dataset_summaries,
        total_rule_hits,
        rule_hit_details,
        files: input.files,
        warnings: input.warnings,
    }
}
