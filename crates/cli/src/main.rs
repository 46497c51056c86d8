mod secure;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use casescope_core::{
    extract_file, render_markdown_summary, run_scan_with_callback, CaseSummary, ExtractOptions,
    ScanOptions, ScanPhase,
};
use chrono::Local;
use clap::ArgAction;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "casescope",
    version,
    about = "Scan evidence directories, extract file metadata, and flag suspicious activity in tabular logs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan a directory and emit a JSON case summary.
    Scan(ScanArgs),
    /// Extract and print metadata for a single file.
    Inspect(InspectArgs),
    /// Print the highlights of an existing case summary.
    Report(ReportArgs),
    /// Generate an encryption key for secure mode.
    Keygen(KeygenArgs),
    /// Encrypt a file with a previously generated key.
    Encrypt(CryptArgs),
    /// Decrypt a file produced by `encrypt` or a secure scan.
    Decrypt(CryptArgs),
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Directory to scan.
    directory: PathBuf,

    /// Directory where the summary file is written.
    #[arg(long, default_value = "results", value_name = "DIR")]
    output_dir: PathBuf,

    /// Only scan the top level of the directory.
    #[arg(long)]
    no_recursive: bool,

    /// Extensions to include (repeatable). Defaults to the supported set.
    #[arg(long = "extension", value_name = "EXT", num_args = 1.., action = ArgAction::Append)]
    extensions: Vec<String>,

    /// Exclude glob patterns (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Case-insensitive keyword searched in text files.
    #[arg(long)]
    keyword: Option<String>,

    /// Encrypt the summary instead of writing plaintext JSON.
    #[arg(long)]
    secure: bool,

    /// Key file used by --secure. Generated on first use if missing.
    #[arg(long, default_value = "casescope.key", value_name = "FILE")]
    key: PathBuf,

    /// Worker thread count. Defaults to the machine's CPU count.
    #[arg(long)]
    workers: Option<usize>,

    /// Per-file extraction budget in seconds.
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    file_timeout_secs: u64,

    /// Log progress events while scanning.
    #[arg(long)]
    progress: bool,

    /// Optional markdown summary output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// File to inspect.
    file: PathBuf,

    /// Case-insensitive keyword searched when the file is plain text.
    #[arg(long)]
    keyword: Option<String>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Summary file, plaintext JSON or an `.enc` payload.
    summary: PathBuf,

    /// Key file for encrypted summaries.
    #[arg(long, default_value = "casescope.key", value_name = "FILE")]
    key: PathBuf,

    /// Optional markdown summary output file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct KeygenArgs {
    /// Where to write the key.
    #[arg(long, default_value = "casescope.key", value_name = "FILE")]
    key: PathBuf,

    /// Replace an existing key file.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct CryptArgs {
    /// Input file.
    input: PathBuf,

    /// Key file.
    #[arg(long, default_value = "casescope.key", value_name = "FILE")]
    key: PathBuf,

    /// Output file. Defaults to `<input>.enc` when encrypting and the
    /// stripped name when decrypting.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan_command(args),
        Commands::Inspect(args) => run_inspect_command(args),
        Commands::Report(args) => run_report_command(args),
        Commands::Keygen(args) => {
            secure::generate_key(&args.key, args.force)?;
            println!("Key written to {}", args.key.display());
            Ok(())
        }
        Commands::Encrypt(args) => {
            let output = secure::encrypt_file(&args.key, &args.input, args.output)?;
            println!("Encrypted file written to {}", output.display());
            Ok(())
        }
        Commands::Decrypt(args) => {
            let output = secure::decrypt_file(&args.key, &args.input, args.output)?;
            println!("Decrypted file written to {}", output.display());
            Ok(())
        }
    }
}

fn run_scan_command(args: ScanArgs) -> Result<()> {
    let options = ScanOptions {
        root: args.directory.clone(),
        recursive: !args.no_recursive,
        extensions: args.extensions,
        excludes: args.exclude,
        keyword: args.keyword,
        secure_mode: args.secure,
        workers: args.workers,
        file_timeout: Some(Duration::from_secs(args.file_timeout_secs)),
        emit_progress_events: args.progress,
        ..ScanOptions::default()
    };

    let summary = run_scan_with_callback(&options, |event| {
        if matches!(event.phase, ScanPhase::Extracting) {
            if let Some(path) = &event.current_path {
                info!(
                    processed = event.processed_files,
                    errors = event.errors,
                    "extracted {path}"
                );
            }
        } else {
            info!(phase = ?event.phase, seq = event.seq, "scan phase");
        }
    })?;

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;
    let payload =
        serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let output = if args.secure {
        if !args.key.exists() {
            secure::generate_key(&args.key, false)?;
            println!("Key written to {}", args.key.display());
        }
        let encrypted = secure::encrypt_bytes(&args.key, payload.as_bytes())?;
        let output = args
            .output_dir
            .join(format!("results_{timestamp}.json.enc"));
        fs::write(&output, encrypted)
            .with_context(|| format!("failed to write summary to {}", output.display()))?;
        output
    } else {
        let output = args.output_dir.join(format!("results_{timestamp}.json"));
        fs::write(&output, &payload)
            .with_context(|| format!("failed to write summary to {}", output.display()))?;
        output
    };

    println!("Summary written to {}", output.display());
    print_summary_highlights(&summary);

    if let Some(md_path) = args.md {
        let markdown = render_markdown_summary(&summary);
        fs::write(&md_path, markdown).with_context(|| {
            format!("failed to write markdown summary to {}", md_path.display())
        })?;
        println!("Markdown summary written to {}", md_path.display());
    }

    Ok(())
}

fn run_inspect_command(args: InspectArgs) -> Result<()> {
    let rendered = inspect_file(&args.file, args.keyword)?;
    println!("{rendered}");
    Ok(())
}

/// Single-file view: same extractor the scan pipeline uses, rendered as
/// pretty JSON.
fn inspect_file(path: &Path, keyword: Option<String>) -> Result<String> {
    let options = ExtractOptions {
        keyword,
        timeout: None,
    };
    let outcome = extract_file(path, &options);
    serde_json::to_string_pretty(&outcome.record).context("failed to serialize file record")
}

fn run_report_command(args: ReportArgs) -> Result<()> {
    let raw = fs::read(&args.summary)
        .with_context(|| format!("failed to read {}", args.summary.display()))?;
    let data = if args.summary.extension().is_some_and(|ext| ext == "enc") {
        secure::decrypt_bytes(&args.key, &raw)?
    } else {
        raw
    };
    let summary: CaseSummary = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse {}", args.summary.display()))?;

    print_summary_highlights(&summary);

    if let Some(md_path) = args.md {
        let markdown = render_markdown_summary(&summary);
        fs::write(&md_path, markdown).with_context(|| {
            format!("failed to write markdown summary to {}", md_path.display())
        })?;
        println!("Markdown summary written to {}", md_path.display());
    }

    Ok(())
}

fn print_summary_highlights(summary: &CaseSummary) {
    println!(
        "Scanned {} file(s) under {} in {} ms with {} worker(s).",
        summary.files_scanned,
        summary.scan.directory,
        summary.scan_metrics.elapsed_ms,
        summary.scan_metrics.workers
    );
    for (kind, count) in &summary.files_by_kind {
        println!("- {kind}: {count} file(s)");
    }
    if summary.total_rule_hits == 0 {
        println!("No suspicious activity detected.");
    } else {
        println!(
            "Suspicious activity: {} matched row(s) across {} rule hit(s).",
            summary.total_rule_hits,
            summary.rule_hit_details.len()
        );
        for hit in &summary.rule_hit_details {
            println!("- [{}] {}", hit.rule_id, hit.description);
        }
    }
    if summary.scan_metrics.extraction_errors > 0 {
        println!(
            "{} file(s) had extraction errors; see the summary for details.",
            summary.scan_metrics.extraction_errors
        );
    }
    if !summary.warnings.is_empty() {
        println!("{} warning(s) recorded.", summary.warnings.len());
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
