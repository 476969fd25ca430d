//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod extract;

use std::path::{Path, PathBuf};

use tracing::debug;

use tabex_core::models::config::TabexConfig;
use tabex_core::models::table::Table;

/// Output format of an extracted table.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON object with headers, row records and confidence
    Json,
    /// CSV with a header line
    Csv,
    /// Aligned plain-text columns
    Text,
    /// HTML table
    Html,
}

impl OutputFormat {
    /// File extension used for per-file outputs.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
            OutputFormat::Html => "html",
        }
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabex")
        .join("config.json")
}

/// Resolve the configuration file path, honouring `--config`.
pub fn config_path(override_path: Option<&str>) -> PathBuf {
    override_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration.
///
/// An explicit path must exist. The default path is used when present,
/// otherwise built-in defaults apply.
pub fn load_config(override_path: Option<&str>) -> anyhow::Result<TabexConfig> {
    if let Some(path) = override_path {
        return Ok(TabexConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(TabexConfig::from_file(&path)?)
    } else {
        Ok(TabexConfig::default())
    }
}

pub fn format_table(table: &Table, format: OutputFormat, pretty: bool) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(table)?),
        OutputFormat::Json => Ok(serde_json::to_string(table)?),
        OutputFormat::Csv => format_csv(table),
        OutputFormat::Text => Ok(format_text(table)),
        OutputFormat::Html => Ok(table.to_html()),
    }
}

fn format_csv(table: &Table) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    if !table.headers.is_empty() {
        wtr.write_record(&table.headers)?;
    }
    for row in &table.rows {
        wtr.write_record(row)?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(table: &Table) -> String {
    if table.is_empty() {
        return "No table found\n".to_string();
    }

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut output = line(&table.headers);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&format!("{}\n", rule.join("  ")));
    for row in &table.rows {
        output.push_str(&line(row));
    }

    output
}
