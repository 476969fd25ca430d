//! Batch command - extract tables from many PDF files concurrently.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use tabex_core::models::config::TabexConfig;
use tabex_core::models::table::Table;
use tabex_core::{ExtractRequest, WorkerMessage, handle};

use super::{OutputFormat, format_table, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input PDF files
    #[arg(required = true)]
    input: String,

    /// Output directory (default: next to each input)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of files processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of processing a single file.
struct FileResult {
    path: PathBuf,
    table: Option<Table>,
    error: Option<String>,
    processing_time_ms: u64,
    finished_at: DateTime<Local>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = Arc::new(load_config(config_path)?);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let multi_progress = MultiProgress::new();
    let overall_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut outcomes = stream::iter(files)
        .map(|path| {
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || {
                let file_start = Instant::now();
                let result = process_file(&path, &config);
                (path, result, file_start.elapsed().as_millis() as u64)
            })
        })
        .buffered(args.jobs.max(1));

    let mut results = Vec::new();
    while let Some(joined) = outcomes.next().await {
        let (path, result, processing_time_ms) = joined?;
        overall_pb.inc(1);

        match result {
            Ok(table) => {
                write_output(&path, &table, &args, config.output.pretty_json)?;
                results.push(FileResult {
                    path,
                    table: Some(table),
                    error: None,
                    processing_time_ms,
                    finished_at: Local::now(),
                });
            }
            Err(e) => {
                let error_msg = e.to_string();
                if !args.continue_on_error {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing {} failed: {}", path.display(), error_msg);
                }
                warn!("Failed to process {}: {}", path.display(), error_msg);
                results.push(FileResult {
                    path,
                    table: None,
                    error: Some(error_msg),
                    processing_time_ms,
                    finished_at: Local::now(),
                });
            }
        }
    }

    overall_pb.finish_with_message("Complete");

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

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
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
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Run one document through the request handler and keep its terminal message.
fn process_file(path: &Path, config: &TabexConfig) -> anyhow::Result<Table> {
    let data = fs::read(path)?;

    let mut outcome = None;
    handle(ExtractRequest::new(data), config, |message| match message {
        WorkerMessage::Progress { value } => {
            debug!("{}: {:.0}%", path.display(), value * 100.0);
        }
        WorkerMessage::Complete { data } => outcome = Some(Ok(data)),
        WorkerMessage::Error { error } => outcome = Some(Err(anyhow::anyhow!(error))),
    });

    outcome.unwrap_or_else(|| Err(anyhow::anyhow!("extraction produced no result")))
}

fn output_path(input: &Path, args: &BatchArgs) -> PathBuf {
    let extension = args.format.extension();
    match &args.output_dir {
        Some(dir) => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("table");
            dir.join(format!("{}.{}", stem, extension))
        }
        None => input.with_extension(extension),
    }
}

fn write_output(input: &Path, table: &Table, args: &BatchArgs, pretty: bool) -> anyhow::Result<()> {
    let path = output_path(input, args);
    fs::write(&path, format_table(table, args.format, pretty)?)?;
    debug!("Wrote output to {}", path.display());
    Ok(())
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "columns",
        "rows",
        "confidence",
        "processing_time_ms",
        "finished_at",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let finished_at = result.finished_at.to_rfc3339();

        let record = match &result.table {
            Some(table) => [
                filename.to_string(),
                "success".to_string(),
                table.num_cols().to_string(),
                table.num_rows().to_string(),
                format!("{:.2}", table.confidence),
                result.processing_time_ms.to_string(),
                finished_at,
                String::new(),
            ],
            None => [
                filename.to_string(),
                "error".to_string(),
                String::new(),
                String::new(),
                String::new(),
                result.processing_time_ms.to_string(),
                finished_at,
                result.error.clone().unwrap_or_default(),
            ],
        };
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
