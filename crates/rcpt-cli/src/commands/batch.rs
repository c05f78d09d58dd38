//! Batch processing command for multiple receipt images.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use rcpt_core::{ParseResult, PureOcrLoader, ReceiptProcessor};

use super::process::{apply_overrides, format_result, OutputFormat};

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "tiff", "tif", "bmp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input images (e.g. "receipts/*.jpg")
    #[arg(required = true)]
    input: String,

    /// Output directory for per-file results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Send original images to the OCR engine without preprocessing
    #[arg(long)]
    no_preprocess: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    result: ParseResult,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = super::config::load(config_path)?;
    apply_overrides(&mut config, args.model_dir.clone(), args.no_preprocess);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching images found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    // One engine for the whole batch; images go through it one at a time.
    let processor = ReceiptProcessor::new(PureOcrLoader::new(config.ocr.clone()), &config);
    let mut results = Vec::with_capacity(files.len());

    let work = async {
        for path in &files {
            let file_start = Instant::now();
            let result = processor.process_image(path).await;

            results.push(FileResult {
                path: path.clone(),
                result,
                processing_time_ms: file_start.elapsed().as_millis() as u64,
            });
            overall_pb.inc(1);
        }
    };

    let interrupted = tokio::select! {
        _ = work => false,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            true
        }
    };

    overall_pb.finish_and_clear();

    if let Err(e) = processor.shutdown().await {
        warn!("OCR engine shutdown: {}", e);
    }

    if let Some(ref output_dir) = args.output_dir {
        for file in &results {
            let output_name = file
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("receipt");
            let output_path =
                output_dir.join(format!("{}.{}", output_name, args.format.extension()));

            fs::write(&output_path, format_result(&file.result, args.format)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&FileResult> = results.iter().filter(|f| !f.result.is_success()).collect();

    println!();
    println!(
        "{} Processed {} of {} files in {:?}",
        style("✓").green(),
        results.len(),
        files.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for file in &failed {
            if let ParseResult::Failure(failure) = &file.result {
                println!("  - {}: {}", file.path.display(), failure.kind);
            }
        }
    }

    if interrupted {
        anyhow::bail!("Interrupted after {} of {} files", results.len(), files.len());
    }

    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "store_name",
        "date",
        "items",
        "total",
        "processing_time_ms",
        "error",
    ])?;

    for file in results {
        let filename = file.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let time = file.processing_time_ms.to_string();

        match &file.result {
            ParseResult::Success { receipt, .. } => {
                wtr.write_record([
                    filename,
                    "success",
                    &receipt.store_name,
                    &receipt.date,
                    &receipt.items.len().to_string(),
                    &receipt.total.map(|t| t.to_string()).unwrap_or_default(),
                    &time,
                    "",
                ])?;
            }
            ParseResult::Failure(failure) => {
                wtr.write_record([
                    filename,
                    "error",
                    &failure.partial.store_name,
                    &failure.partial.date,
                    "0",
                    "",
                    &time,
                    failure.kind.as_str(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("receipts/scan.JPG")));
        assert!(is_image(Path::new("receipt.png")));
        assert!(!is_image(Path::new("receipt.pdf")));
        assert!(!is_image(Path::new("README")));
    }
}
