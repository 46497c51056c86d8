use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SUMMARY_VERSION: &str = "1.0.0";

/// Final, serializable result of one scan. All keys are strings and all
/// values are JSON-representable; paths are stored as strings, never as
/// native path objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSummary {
    pub summary_version: String,
    pub generated_at: String,
    #[serde(default = "default_scan_id")]
    pub scan_id: String,
    pub scan: ScanMetadata,
    #[serde(default)]
    pub scan_metrics: ScanMetrics,
    #[serde(default)]
    pub scan_progress_summary: ScanProgressSummary,
    pub files_scanned: u64,
    pub files_by_kind: BTreeMap<FileKind, u64>,
    pub dataset_summaries: Vec<DatasetSummary>,
    pub total_rule_hits: u64,
    pub rule_hit_details: Vec<RuleHit>,
    pub files: Vec<FileRecord>,
    pub warnings: Vec<String>,
}

fn default_scan_id() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanMetadata {
    pub directory: String,
    pub recursive: bool,
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
    pub keyword: Option<String>,
    /// Passed through untouched for the persistence/encryption layer.
    #[serde(default)]
    pub secure_mode: bool,
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub file_timeout_secs: Option<u64>,
    #[serde(default)]
    pub emit_progress_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScanMetrics {
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub discovered_files: u64,
    #[serde(default)]
    pub scanned_bytes: u64,
    #[serde(default)]
    pub extraction_errors: u64,
    #[serde(default)]
    pub dataset_errors: u64,
    #[serde(default)]
    pub workers: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScanProgressSummary {
    #[serde(default)]
    pub total_events: u64,
    #[serde(default)]
    pub phase_counts: Vec<ScanPhaseCount>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanPhaseCount {
    pub phase: ScanPhase,
    pub events: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanProgressEvent {
    pub seq: u64,
    pub scan_id: String,
    pub phase: ScanPhase,
    pub current_path: Option<String>,
    pub processed_files: u64,
    pub errors: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Discovering,
    Extracting,
    EvaluatingRules,
    Aggregating,
    Done,
}

/// Coarse content classification of a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Document,
    Tabular,
    Text,
    Unknown,
}

impl fmt::Display for FileKind {
    /// Same names the serde representation uses, so human-readable surfaces
    /// match the JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Image => "image",
            FileKind::Document => "document",
            FileKind::Tabular => "tabular",
            FileKind::Text => "text",
            FileKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One record per discovered file. Immutable after extraction; a failed
/// extraction keeps the base stats and sets `extraction_error` instead of
/// dropping the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub file_name: String,
    pub kind: FileKind,
    pub size_bytes: u64,
    pub size_kib: f64,
    pub mime_type: String,
    pub last_modified: Option<String>,
    #[serde(default)]
    pub metadata: Option<KindMetadata>,
    #[serde(default)]
    pub extraction_error: Option<String>,
    #[serde(default)]
    pub keyword_found: Option<bool>,
}

/// Kind-specific metadata block. Absent when extraction failed before any
/// kind-specific parsing could run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum KindMetadata {
    Image {
        #[serde(default)]
        exif_tags: BTreeMap<String, String>,
    },
    Document {
        title: Option<String>,
        author: Option<String>,
        page_count: Option<u64>,
    },
    Tabular {
        row_count: u64,
        column_count: u64,
        missing_cells: u64,
    },
    Text {
        line_count: u64,
        word_count: u64,
        lossy_decoded: bool,
    },
    Unknown,
}

/// One suspicious-activity rule matching one or more dataset rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleHit {
    pub rule_id: String,
    pub description: String,
    pub matched_row_count: u64,
}

/// Per-dataset analysis block, one entry per tabular file discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSummary {
    pub path: String,
    pub row_count: u64,
    pub column_count: u64,
    pub missing_cells: u64,
    /// Frequency distribution of the configured label column; `None` when
    /// the column is absent (not an error).
    #[serde(default)]
    pub label_distribution: Option<BTreeMap<String, u64>>,
    pub rule_hits: Vec<RuleHit>,
    pub total_rule_hits: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl DatasetSummary {
    /// Placeholder for a tabular file that failed to load; rule evaluation
    /// is skipped and the failure travels with the summary.
    pub fn load_failure(path: String, error: String) -> Self {
        Self {
            path,
            row_count: 0,
            column_count: 0,
            missing_cells: 0,
            label_distribution: None,
            rule_hits: Vec::new(),
            total_rule_hits: 0,
            error: Some(error),
        }
    }
}
