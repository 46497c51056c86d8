use std::fs;

use anyhow::Result;
use tempfile::TempDir;

use casescope_core::discover::DiscoveryError;
use casescope_core::model::FileKind;
use casescope_core::scan::{run_scan, ScanError, ScanOptions};

fn evidence_fixture() -> Result<TempDir> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("notes.txt"),
        "routine access log\nnothing unusual here\n",
    )?;
    fs::write(
        temp.path().join("sessions.csv"),
        "User,Action,Login_Attempts,Label\n\
         alice,Read,2,benign\n\
         bob,Delete,9,malicious\n\
         carol,Upload,1,malicious\n\
         dave,Read,,benign\n",
    )?;
    fs::write(temp.path().join("photo.jpg"), [0xFF, 0xD8, 0xFF, 0xE0, 0x00])?;
    fs::write(temp.path().join("damaged.pdf"), b"%PDF-1.4 truncated garbage")?;
    let nested = temp.path().join("archive");
    fs::create_dir(&nested)?;
    fs::write(nested.join("old.txt"), "archived text\n")?;
    Ok(temp)
}

#[test]
fn full_pipeline_over_mixed_evidence() -> Result<()> {
    let temp = evidence_fixture()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        scan_id: Some("pipeline-test".to_string()),
        ..ScanOptions::default()
    };

    let summary = run_scan(&options)?;

    assert_eq!(summary.files_scanned, 5);
    assert_eq!(summary.scan_metrics.discovered_files, 5);
    let kind_total: u64 = summary.files_by_kind.values().sum();
    assert_eq!(kind_total, summary.files_scanned);
    assert_eq!(summary.files_by_kind[&FileKind::Text], 2);
    assert_eq!(summary.files_by_kind[&FileKind::Tabular], 1);
    assert_eq!(summary.files_by_kind[&FileKind::Image], 1);
    assert_eq!(summary.files_by_kind[&FileKind::Document], 1);

    // bob: Delete + 9 attempts (two rules); carol: Upload (one rule)
    assert_eq!(summary.dataset_summaries.len(), 1);
    let dataset = &summary.dataset_summaries[0];
    assert_eq!(dataset.row_count, 4);
    assert_eq!(dataset.column_count, 4);
    assert_eq!(dataset.missing_cells, 1);
    assert_eq!(dataset.total_rule_hits, 3);
    assert_eq!(summary.total_rule_hits, 3);
    let labels = dataset.label_distribution.as_ref().expect("labels");
    assert_eq!(labels["benign"], 2);
    assert_eq!(labels["malicious"], 2);

    // the damaged document is reported, not dropped
    let damaged = summary
        .files
        .iter()
        .find(|record| record.file_name == "damaged.pdf")
        .expect("damaged record");
    assert!(damaged.extraction_error.is_some());
    assert!(damaged.size_bytes > 0);
    assert_eq!(summary.scan_metrics.extraction_errors, 1);

    Ok(())
}

#[test]
fn summary_round_trips_through_json() -> Result<()> {
    let temp = evidence_fixture()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        scan_id: Some("json-test".to_string()),
        ..ScanOptions::default()
    };

    let summary = run_scan(&options)?;
    let encoded = serde_json::to_string_pretty(&summary)?;
    let decoded: casescope_core::model::CaseSummary = serde_json::from_str(&encoded)?;
    assert_eq!(decoded, summary);

    Ok(())
}

#[test]
fn repeated_scans_are_stable_apart_from_timing() -> Result<()> {
    let temp = evidence_fixture()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        scan_id: Some("stable-test".to_string()),
        ..ScanOptions::default()
    };

    let mut first = run_scan(&options)?;
    let mut second = run_scan(&options)?;
    first.generated_at.clear();
    second.generated_at.clear();
    first.scan_metrics.elapsed_ms = 0;
    second.scan_metrics.elapsed_ms = 0;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn non_recursive_scan_skips_nested_directories() -> Result<()> {
    let temp = evidence_fixture()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        recursive: false,
        ..ScanOptions::default()
    };

    let summary = run_scan(&options)?;
    assert_eq!(summary.files_scanned, 4);
    assert!(summary
        .files
        .iter()
        .all(|record| !record.path.contains("archive")));
    Ok(())
}

#[test]
fn empty_directory_reports_no_matches() -> Result<()> {
    let temp = TempDir::new()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        ..ScanOptions::default()
    };

    match run_scan(&options) {
        Err(ScanError::Discovery(DiscoveryError::NoMatches(_))) => Ok(()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn each_dataset_gets_its_own_summary() -> Result<()> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("alpha.csv"),
        "User,Action,Login_Attempts\nbob,Delete,9\ncarol,Upload,1\n",
    )?;
    fs::write(
        temp.path().join("beta.csv"),
        "User,Action,Login_Attempts\nalice,Read,2\n",
    )?;
    fs::write(temp.path().join("gamma.csv"), "")?;

    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        ..ScanOptions::default()
    };
    let summary = run_scan(&options)?;

    assert_eq!(summary.dataset_summaries.len(), 3);
    let paths: Vec<&String> = summary
        .dataset_summaries
        .iter()
        .map(|dataset| &dataset.path)
        .collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);

    // alpha: bob trips both rules (Delete, 9 attempts), carol trips one (Upload)
    let alpha = &summary.dataset_summaries[0];
    assert_eq!(alpha.total_rule_hits, 3);
    assert_eq!(alpha.rule_hits.len(), 2);
    let beta = &summary.dataset_summaries[1];
    assert_eq!(beta.total_rule_hits, 0);
    assert!(beta.rule_hits.is_empty());
    assert!(beta.error.is_none());
    let gamma = &summary.dataset_summaries[2];
    assert!(gamma.error.is_some());
    assert_eq!(gamma.row_count, 0);

    assert_eq!(summary.total_rule_hits, 3);
    assert_eq!(summary.rule_hit_details.len(), 2);
    assert_eq!(summary.scan_metrics.dataset_errors, 1);
    Ok(())
}

#[test]
fn extension_filter_narrows_the_scan() -> Result<()> {
    let temp = evidence_fixture()?;
    let options = ScanOptions {
        root: temp.path().to_path_buf(),
        extensions: vec!["csv".to_string()],
        ..ScanOptions::default()
    };

    let summary = run_scan(&options)?;
    assert_eq!(summary.files_scanned, 1);
    assert_eq!(summary.files[0].kind, FileKind::Tabular);
    Ok(())
}
