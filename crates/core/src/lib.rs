pub mod aggregate;
pub mod dataset;
pub mod discover;
pub mod extract;
pub mod markdown;
pub mod model;
pub mod rules;
pub mod scan;

pub use aggregate::{aggregate, AggregateInput};
pub use dataset::{
    dataset_stats, load_dataset, CellValue, Dataset, DatasetLoadError, DatasetRow, DatasetStats,
};
pub use discover::{discover, DiscoverOptions, DiscoveryError, DEFAULT_EXTENSIONS};
pub use extract::{extract_file, infer_kind, ExtractOptions, ExtractOutcome};
pub use markdown::render_markdown_summary;
pub use model::{
    CaseSummary, DatasetSummary, FileKind, FileRecord, KindMetadata, RuleHit, ScanMetadata,
    ScanMetrics, ScanPhase, ScanPhaseCount, ScanProgressEvent, ScanProgressSummary,
    SUMMARY_VERSION,
};
pub use rules::{
    ExcessAttemptsRule, ForbiddenActionRule, RuleConfig, RuleEngine, RuleEvaluation, SuspicionRule,
};
pub use scan::{
    run_scan, run_scan_with_callback, run_scan_with_events, ScanError, ScanOptions, ScanRunOutput,
};
