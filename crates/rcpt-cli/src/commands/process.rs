//! Process command - extract data from a single receipt image.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use rcpt_core::{ParseResult, PureOcrLoader, ReceiptConfig, ReceiptProcessor};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input receipt image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Send the original image to the OCR engine without preprocessing
    #[arg(long)]
    no_preprocess: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::config::load(config_path)?;
    apply_overrides(&mut config, args.model_dir.clone(), args.no_preprocess);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let processor = ReceiptProcessor::new(PureOcrLoader::new(config.ocr.clone()), &config);

    let pb = spinner("Reading receipt...");

    let outcome = tokio::select! {
        result = processor.process_image(&args.input) => Some(result),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            None
        }
    };

    pb.finish_and_clear();

    if let Err(e) = processor.shutdown().await {
        warn!("OCR engine shutdown: {}", e);
    }

    let Some(result) = outcome else {
        anyhow::bail!("Interrupted");
    };

    let output = format_result(&result, args.format)?;

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

    report_failure(&result);

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn apply_overrides(config: &mut ReceiptConfig, model_dir: Option<PathBuf>, no_preprocess: bool) {
    if let Some(model_dir) = model_dir {
        config.ocr.model_dir = model_dir;
    }
    if no_preprocess {
        config.preprocessing.enabled = false;
    }
}

pub fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print the failure reason to stderr so it is visible next to JSON output.
pub fn report_failure(result: &ParseResult) {
    if let ParseResult::Failure(failure) = result {
        eprintln!(
            "{} {}: {}",
            style("✗").red(),
            failure.kind,
            failure.message
        );
    }
}

pub fn format_result(result: &ParseResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ParseResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["status", "store_name", "date", "item", "price", "total", "tax", "error"])?;

    match result {
        ParseResult::Success { receipt, .. } => {
            let total = decimal_or_empty(receipt.total);
            let tax = decimal_or_empty(receipt.tax);
            for item in &receipt.items {
                wtr.write_record([
                    "success",
                    &receipt.store_name,
                    &receipt.date,
                    &item.name,
                    &decimal_or_empty(item.price),
                    &total,
                    &tax,
                    "",
                ])?;
            }
        }
        ParseResult::Failure(failure) => {
            wtr.write_record([
                "error",
                &failure.partial.store_name,
                &failure.partial.date,
                "",
                "",
                "",
                "",
                failure.kind.as_str(),
            ])?;
        }
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(result: &ParseResult) -> String {
    let mut output = String::new();

    match result {
        ParseResult::Success { receipt, .. } => {
            output.push_str(&format!("Store: {}\n", receipt.store_name));
            output.push_str(&format!("Date:  {}\n", receipt.date));
            output.push('\n');

            output.push_str("Items:\n");
            for item in &receipt.items {
                match item.price {
                    Some(price) => output.push_str(&format!("  {:<32} {:>8}\n", item.name, price)),
                    None => output.push_str(&format!("  {}\n", item.name)),
                }
            }

            if let Some(tax) = receipt.tax {
                output.push_str(&format!("\nTax:   {}\n", tax));
            }
            if let Some(total) = receipt.total {
                output.push_str(&format!("Total: {}\n", total));
            }
        }
        ParseResult::Failure(failure) => {
            output.push_str(&format!("Error: {}\n", failure.kind));
            output.push_str(&format!("  {}\n", failure.message));
            output.push('\n');
            output.push_str(&format!("Store: {}\n", failure.partial.store_name));
            output.push_str(&format!("Date:  {}\n", failure.partial.date));
        }
    }

    output
}

fn decimal_or_empty<D: ToString>(value: Option<D>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
