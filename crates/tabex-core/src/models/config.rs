//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TabexError};
use crate::table;

/// Main configuration for the tabex pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabexConfig {
    /// Table reconstruction heuristics.
    pub reconstruct: ReconstructConfig,

    /// Page extraction configuration.
    pub extraction: ExtractionConfig,

    /// Output rendering configuration.
    pub output: OutputConfig,
}

/// Tunable heuristics of the table reconstructor.
///
/// The defaults are empirically tuned values; changing them changes which
/// fragments end up in which row or cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructConfig {
    /// Maximum vertical distance from the row baseline for a fragment to
    /// join the current row.
    pub row_tolerance: f64,

    /// Multiplier applied to a fragment's height to obtain the largest
    /// horizontal gap that still merges it into the open cell.
    pub cell_gap_factor: f64,

    /// Number of leading lines scanned when choosing the header line.
    pub header_scan_depth: usize,

    /// Lines with fewer than `floor(min_row_fill * header_len)` cells are
    /// dropped from the output.
    pub min_row_fill: f64,

    /// Confidence reported for any non-empty input.
    pub confidence: f64,

    /// Compute the per-document column-frequency histogram. The histogram
    /// is only logged, it never filters the output table.
    pub column_histogram: bool,

    /// Per-page frequency a column start needs to count as a boundary.
    pub column_min_frequency: f64,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            row_tolerance: table::ROW_TOLERANCE,
            cell_gap_factor: table::CELL_GAP_FACTOR,
            header_scan_depth: table::HEADER_SCAN_DEPTH,
            min_row_fill: table::MIN_ROW_FILL,
            confidence: table::FIXED_CONFIDENCE,
            column_histogram: false,
            column_min_frequency: table::COLUMN_MIN_FREQUENCY,
        }
    }
}

/// Page extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages extracted concurrently before a progress message is emitted.
    pub page_chunk_size: usize,

    /// Drop whitespace-only text runs while walking content streams.
    pub skip_blank_fragments: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_chunk_size: table::PAGE_CHUNK_SIZE,
            skip_blank_fragments: true,
        }
    }
}

/// Output rendering configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty_json: bool,
}

impl TabexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.extraction.page_chunk_size == 0 {
            return Err(TabexError::Config(
                "extraction.page_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.reconstruct.row_tolerance < 0.0 {
            return Err(TabexError::Config(
                "reconstruct.row_tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
