//! Extract command - turn a single invoice document into one record.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::{Document, InvoiceRecord, ProcessingStatus};

use super::{apply_overrides, build_extractor, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF, text or markdown)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Completion model (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Per-call timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output with header
    Csv,
    /// Plain text listing
    Text,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args.model.clone(), args.timeout, None);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extractor = build_extractor(config)?;
    info!("Extracting file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Extracting {}...", args.input.display()));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    let record = extractor.extract(&Document::from_path(&args.input)).await;

    pb.finish_and_clear();

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(message) = &record.error_message {
        eprintln!("{} {}: {}", style("✗").red(), record.source_id, message);
    } else if !record.is_reconciled() {
        eprintln!(
            "{} subtotal + tax_amount does not match net_total",
            style("!").yellow()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub(crate) fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &InvoiceRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.serialize(record)?;
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(record: &InvoiceRecord) -> String {
    fn show<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    }

    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", record.source_id));
    output.push_str(&format!("Status:   {}\n", record.processing_status));

    if record.processing_status == ProcessingStatus::Failed {
        output.push_str(&format!("Error:    {}\n", show(&record.error_message)));
        return output;
    }

    output.push('\n');
    output.push_str(&format!("Invoice:  {}\n", show(&record.invoice_number)));
    output.push_str(&format!("Date:     {}\n", show(&record.date)));
    output.push('\n');

    output.push_str("Party:\n");
    output.push_str(&format!("  {}\n", show(&record.party_name)));
    if let Some(address) = &record.party_address {
        output.push_str(&format!("  {}\n", address));
    }
    if let Some(tax_id) = &record.tax_id {
        output.push_str(&format!("  Tax ID: {}\n", tax_id));
    }
    output.push('\n');

    let currency = record.currency.as_deref().unwrap_or("");
    output.push_str("Amounts:\n");
    output.push_str(&format!("  Subtotal: {} {}\n", show(&record.subtotal), currency));
    output.push_str(&format!("  Tax:      {} {}\n", show(&record.tax_amount), currency));
    output.push_str(&format!("  Total:    {} {}\n", show(&record.net_total), currency));

    if let Some(count) = record.line_item_count {
        output.push_str(&format!("\nLine items: {}\n", count));
    }

    output
}
