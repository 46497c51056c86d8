use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{aggregate, AggregateInput};
use crate::dataset::dataset_stats;
use crate::discover::{discover, DiscoverOptions, DiscoveryError, DEFAULT_EXTENSIONS};
use crate::extract::{extract_file, ExtractOptions, ExtractOutcome};
use crate::model::{
    CaseSummary, DatasetSummary, FileKind, ScanMetadata, ScanMetrics, ScanPhase, ScanPhaseCount,
    ScanProgressEvent, ScanProgressSummary,
};
use crate::rules::{RuleConfig, RuleEngine};

const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("invalid scan options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub recursive: bool,
    /// Empty means the default supported set.
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
    pub keyword: Option<String>,
    pub secure_mode: bool,
    pub rule_config: RuleConfig,
    /// `None` sizes the pool to the machine, capped at the file count.
    pub workers: Option<usize>,
    pub file_timeout: Option<Duration>,
    pub scan_id: Option<String>,
    pub emit_progress_events: bool,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            recursive: true,
            extensions: Vec::new(),
            excludes: Vec::new(),
            keyword: None,
            secure_mode: false,
            rule_config: RuleConfig::default(),
            workers: None,
            file_timeout: Some(DEFAULT_FILE_TIMEOUT),
            scan_id: None,
            emit_progress_events: false,
            cancel_flag: None,
        }
    }
}

pub struct ScanRunOutput {
    pub summary: CaseSummary,
    pub events: Vec<ScanProgressEvent>,
}

pub fn run_scan(options: &ScanOptions) -> Result<CaseSummary, ScanError> {
    run_scan_with_callback(options, |_| {})
}

pub fn run_scan_with_events(options: &ScanOptions) -> Result<ScanRunOutput, ScanError> {
    let mut events = Vec::new();
    let summary = run_scan_with_callback(options, |event| events.push(event))?;
    Ok(ScanRunOutput { summary, events })
}

pub fn run_scan_with_callback<F>(
    options: &ScanOptions,
    mut on_event: F,
) -> Result<CaseSummary, ScanError>
where
    F: FnMut(ScanProgressEvent),
{
    validate_scan_options(options)?;
    let started = Instant::now();
    let scan_id = options
        .scan_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut warnings = Vec::new();
    let mut total_events = 0_u64;
    let mut phase_counts: HashMap<ScanPhase, u64> = HashMap::new();

    emit_scan_event(
        options,
        &mut on_event,
        &scan_id,
        &mut total_events,
        &mut phase_counts,
        ScanPhase::Discovering,
        None,
        0,
        0,
    );

    let extensions = if options.extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
    } else {
        options.extensions.clone()
    };
    let discover_options = DiscoverOptions {
        root: options.root.clone(),
        recursive: options.recursive,
        extensions: extensions.clone(),
        excludes: options.excludes.clone(),
    };
    let paths = discover(&discover_options, &mut warnings)?;
    info!(
        scan_id = %scan_id,
        files = paths.len(),
        "discovered files under {}",
        options.root.display()
    );

    emit_scan_event(
        options,
        &mut on_event,
        &scan_id,
        &mut total_events,
        &mut phase_counts,
        ScanPhase::Extracting,
        None,
        0,
        warnings.len() as u64,
    );

    let worker_count = options
        .workers
        .unwrap_or_else(|| num_cpus::get().min(paths.len()))
        .max(1);
    let extract_options = ExtractOptions {
        keyword: options.keyword.clone(),
        timeout: options.file_timeout,
    };

    let mut slots: Vec<Option<ExtractOutcome>> = Vec::new();
    slots.resize_with(paths.len(), || None);
    let mut processed = 0_u64;
    let mut extraction_errors = 0_u64;

    std::thread::scope(|scope| {
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
        let (result_tx, result_rx) = crossbeam_channel::bounded::<(usize, ExtractOutcome)>(256);
        for (index, path) in paths.iter().enumerate() {
            // Receiver is alive, the channel is unbounded; send cannot fail.
            let _ = task_tx.send((index, path.clone()));
        }
        drop(task_tx);

        for _ in 0..worker_count {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let extract_options = &extract_options;
            let cancel_flag = options.cancel_flag.clone();
            scope.spawn(move || {
                while let Ok((index, path)) = task_rx.recv() {
                    if cancel_flag
                        .as_deref()
                        .is_some_and(|flag| flag.load(Ordering::Relaxed))
                    {
                        break;
                    }
                    let outcome = extract_file(&path, extract_options);
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (index, outcome) in result_rx.iter() {
            processed += 1;
            if outcome.record.extraction_error.is_some() {
                extraction_errors += 1;
            }
            emit_scan_event(
                options,
                &mut on_event,
                &scan_id,
                &mut total_events,
                &mut phase_counts,
                ScanPhase::Extracting,
                Some(outcome.record.path.clone()),
                processed,
                extraction_errors,
            );
            slots[index] = Some(outcome);
        }
    });

    let cancelled = is_cancelled(options);
    if cancelled {
        warnings.push("scan canceled by caller; summary contains partial data".to_string());
    }

    // Compact in discovery order so the output stays deterministic even
    // though extraction finished out of order.
    let outcomes: Vec<ExtractOutcome> = slots.into_iter().flatten().collect();
    let scanned_bytes = outcomes
        .iter()
        .map(|outcome| outcome.record.size_bytes)
        .sum();

    emit_scan_event(
        options,
        &mut on_event,
        &scan_id,
        &mut total_events,
        &mut phase_counts,
        ScanPhase::EvaluatingRules,
        None,
        processed,
        extraction_errors,
    );

    let engine = RuleEngine::with_defaults(&options.rule_config);
    let mut dataset_summaries = Vec::new();
    let mut files = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match &outcome.dataset {
            Some(dataset) => {
                let stats = dataset_stats(dataset, &options.rule_config.label_column);
                let evaluation = engine.evaluate(dataset);
                dataset_summaries.push(DatasetSummary {
                    path: outcome.record.path.clone(),
                    row_count: stats.row_count,
                    column_count: stats.column_count,
                    missing_cells: stats.missing_cells,
                    label_distribution: stats.label_distribution,
                    rule_hits: evaluation.hits,
                    total_rule_hits: evaluation.total_hits,
                    error: None,
                });
            }
            None if outcome.record.kind == FileKind::Tabular => {
                let error = outcome
                    .record
                    .extraction_error
                    .clone()
                    .unwrap_or_else(|| "dataset unavailable".to_string());
                dataset_summaries.push(DatasetSummary::load_failure(
                    outcome.record.path.clone(),
                    error,
                ));
            }
            None => {}
        }
        files.push(outcome.record);
    }
    let dataset_errors = dataset_summaries
        .iter()
        .filter(|summary| summary.error.is_some())
        .count() as u64;

    emit_scan_event(
        options,
        &mut on_event,
        &scan_id,
        &mut total_events,
        &mut phase_counts,
        ScanPhase::Aggregating,
        None,
        processed,
        extraction_errors,
    );

    let scan = ScanMetadata {
        directory: options.root.to_string_lossy().to_string(),
        recursive: options.recursive,
        extensions,
        excludes: options.excludes.clone(),
        keyword: options.keyword.clone(),
        secure_mode: options.secure_mode,
        workers: worker_count,
        file_timeout_secs: options.file_timeout.map(|timeout| timeout.as_secs()),
        emit_progress_events: options.emit_progress_events,
    };
    let scan_metrics = ScanMetrics {
        elapsed_ms: started.elapsed().as_millis() as u64,
        discovered_files: paths.len() as u64,
        scanned_bytes,
        extraction_errors,
        dataset_errors,
        workers: worker_count as u64,
    };

    emit_scan_event(
        options,
        &mut on_event,
        &scan_id,
        &mut total_events,
        &mut phase_counts,
        ScanPhase::Done,
        None,
        processed,
        extraction_errors,
    );

    let mut summary = aggregate(AggregateInput {
        scan_id,
        scan,
        scan_metrics,
        scan_progress_summary: ScanProgressSummary::default(),
        files,
        dataset_summaries,
        warnings,
    });
    summary.scan_progress_summary = ScanProgressSummary {
        total_events,
        phase_counts: ordered_phase_counts(&phase_counts),
        completed: !cancelled,
    };

    Ok(summary)
}

fn validate_scan_options(options: &ScanOptions) -> Result<(), ScanError> {
    if options.workers == Some(0) {
        return Err(ScanError::InvalidOptions(
            "worker count must be at least 1".to_string(),
        ));
    }
    if options.file_timeout == Some(Duration::ZERO) {
        return Err(ScanError::InvalidOptions(
            "file timeout must be positive".to_string(),
        ));
    }
    Ok(())
}

fn is_cancelled(options: &ScanOptions) -> bool {
    options
        .cancel_flag
        .as_deref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn ordered_phase_counts(phase_counts: &HashMap<ScanPhase, u64>) -> Vec<ScanPhaseCount> {
    [
        ScanPhase::Discovering,
        ScanPhase::Extracting,
        ScanPhase::EvaluatingRules,
        ScanPhase::Aggregating,
        ScanPhase::Done,
    ]
    .into_iter()
    .filter_map(|phase| {
        phase_counts.get(&phase).map(|events| ScanPhaseCount {
            phase,
            events: *events,
        })
    })
    .collect()
}

#[allow(clippy::too_many_arguments)]
fn emit_scan_event<F>(
    options: &ScanOptions,
    on_event: &mut F,
    scan_id: &str,
    total_events: &mut u64,
    phase_counts: &mut HashMap<ScanPhase, u64>,
    phase: ScanPhase,
    current_path: Option<String>,
    processed_files: u64,
    errors: u64,
) where
    F: FnMut(ScanProgressEvent),
{
    *total_events = total_events.saturating_add(1);
    *phase_counts.entry(phase.clone()).or_insert(0) += 1;

    if options.emit_progress_events {
        on_event(ScanProgressEvent {
            seq: *total_events,
            scan_id: scan_id.to_string(),
            phase,
            current_path,
            processed_files,
            errors,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
    }
}
