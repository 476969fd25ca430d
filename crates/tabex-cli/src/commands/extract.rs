//! Extract command - reconstruct the table of a single PDF file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use tabex_core::models::table::Table;
use tabex_core::{ExtractRequest, TableWorker};

use super::{OutputFormat, format_table, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show extraction confidence and table size
    #[arg(long)]
    show_confidence: bool,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Extracting table from {}", args.input.display());
    let data = fs::read(&args.input)?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")?
            .progress_chars("##-"),
    );
    pb.set_message("Extracting pages...");

    let pretty = config.output.pretty_json;
    let worker = TableWorker::spawn(config)?;
    let worker_pb = pb.clone();
    let table: Table = tokio::task::spawn_blocking(move || {
        let result = worker.extract(ExtractRequest::new(data), |value| {
            worker_pb.set_position((value * 100.0).round() as u64);
        });
        worker.shutdown()?;
        result
    })
    .await??;

    pb.finish_with_message("Done");

    let output = format_table(&table, args.format, pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output.trim_end());
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            table.confidence * 100.0
        );
        println!(
            "{} Table size: {} columns, {} rows",
            style("ℹ").blue(),
            table.num_cols(),
            table.num_rows()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
