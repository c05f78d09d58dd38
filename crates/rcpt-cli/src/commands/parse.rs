//! Parse command - run the receipt heuristics over recognized text.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use tracing::info;

use rcpt_core::{Clock, FixedClock, PatternTables, ReceiptAssembler, SystemClock};

use super::process::{format_result, report_failure, OutputFormat};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Text file with one recognized line per line, or "-" for stdin
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long)]
    today: Option<NaiveDate>,
}

pub fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::config::load(config_path)?;

    let raw_text = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(&args.input)?
    };

    let clock: Box<dyn Clock> = match args.today {
        Some(date) => Box::new(FixedClock(date)),
        None => Box::new(SystemClock),
    };

    info!("Parsing {} characters of text", raw_text.len());

    let assembler = ReceiptAssembler::new(PatternTables::shared_default(), config.extraction);
    let result = assembler.assemble(&raw_text, clock.today());

    println!("{}", format_result(&result, args.format)?);
    report_failure(&result);

    Ok(())
}
