//! Batch command - extract many invoice documents into one dataset.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use invex_core::{BatchSummary, Dataset, Document, InvoiceRecord, LocalTextSource, RecordFilter};

use super::{apply_overrides, build_extractor, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input files
    #[arg(required = true)]
    input: String,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Which records to export
    #[arg(long, default_value = "all", value_parser = parse_filter)]
    show: RecordFilter,

    /// Also write summary.json
    #[arg(long)]
    summary: bool,

    /// Number of documents in flight (overrides config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Completion model (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Per-call timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

fn parse_filter(value: &str) -> Result<RecordFilter, String> {
    value.parse()
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.model.clone(), args.timeout, args.jobs);

    let files = collect_files(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let extractor = build_extractor(config)?;
    let documents = documents_for(&args.input, &files);

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    let dataset = extractor
        .extract_batch_with(&documents, |record| {
            pb.set_message(record.source_id.clone());
            pb.inc(1);
        })
        .await;

    pb.finish_and_clear();

    let csv_path = output_dir.join("invoices.csv");
    let exported = write_records(&csv_path, &dataset.filter(args.show), args.show)?;
    println!(
        "{} Wrote {} records to {}",
        style("✓").green(),
        exported,
        csv_path.display()
    );

    let summary = dataset.summary();
    if args.summary {
        let summary_path = output_dir.join("summary.json");
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_report(&dataset, &summary);

    debug!("Batch finished in {:?}", start.elapsed());

    Ok(())
}

/// Expand the pattern, keeping files the local text source can read.
fn collect_files(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(LocalTextSource::supports)
        })
        .collect();

    files.sort();
    files.dedup();
    Ok(files)
}

/// Literal directory prefix of a glob pattern, before the first wildcard.
fn glob_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        if component.as_os_str().to_string_lossy().contains(['*', '?', '[']) {
            break;
        }
        root.push(component);
    }
    root
}

/// Documents whose source ids are their paths relative to the glob root,
/// so same-named files in different directories stay distinct.
fn documents_for(pattern: &str, files: &[PathBuf]) -> Vec<Document> {
    let root = glob_root(pattern);

    files
        .iter()
        .map(|path| {
            let document = Document::from_path(path);
            match path.strip_prefix(&root) {
                Ok(relative) if !relative.as_os_str().is_empty() => {
                    let source_id = relative.display().to_string();
                    document.with_source_id(source_id)
                }
                _ => document,
            }
        })
        .collect()
}

/// Columns exported for a view; the successful view has no error column.
fn export_columns(filter: RecordFilter) -> &'static [&'static str] {
    let columns = Dataset::columns();
    match filter {
        RecordFilter::Successful => &columns[..columns.len() - 1],
        RecordFilter::All | RecordFilter::Failed => columns,
    }
}

/// CSV cells of `record` for `columns`; nulls are empty cells.
fn record_row(record: &InvoiceRecord, columns: &[&str]) -> anyhow::Result<Vec<String>> {
    let value = serde_json::to_value(record)?;

    Ok(columns
        .iter()
        .map(|column| match &value[*column] {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect())
}

/// Write the records of a view as CSV in column order. Returns the number of rows.
fn write_records(path: &Path, records: &[&InvoiceRecord], filter: RecordFilter) -> anyhow::Result<usize> {
    let columns = export_columns(filter);
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(columns)?;
    for record in records {
        wtr.write_record(record_row(record, columns)?)?;
    }

    wtr.flush()?;
    Ok(records.len())
}

fn print_report(dataset: &Dataset, summary: &BatchSummary) {
    println!();
    println!(
        "{} Processed {} files",
        style("✓").green(),
        summary.total
    );
    println!(
        "   {} successful, {} failed",
        style(summary.succeeded).green(),
        style(summary.failed).red()
    );
    println!(
        "   total amount {}, average {}, total tax {}",
        summary.total_amount.round_dp(2),
        summary.average_amount.round_dp(2),
        summary.total_tax.round_dp(2)
    );

    let failed = dataset.filter(RecordFilter::Failed);
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for record in failed {
            println!(
                "  - {}: {}",
                record.source_id,
                record.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let inconsistent = dataset.inconsistent();
    if !inconsistent.is_empty() {
        println!();
        println!("{}", style("Totals that do not reconcile:").yellow());
        for record in inconsistent {
            println!(
                "  - {}: off by {}",
                record.source_id,
                record.reconciliation_gap().unwrap_or_default()
            );
        }
    }
}
