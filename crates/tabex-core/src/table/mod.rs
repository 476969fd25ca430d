//! Table reconstruction from positioned text fragments.
//!
//! The heuristics below are empirically tuned. [`ReconstructConfig`]
//! exposes each of them; the defaults reproduce these values exactly.
//!
//! [`ReconstructConfig`]: crate::models::config::ReconstructConfig

mod columns;
mod reconstruct;

pub use columns::ColumnHistogram;
pub use reconstruct::{TableReconstructor, reconstruct};

/// Vertical distance from the row baseline beyond which a new row starts.
pub const ROW_TOLERANCE: f64 = 5.0;

/// Gap-to-height ratio below which adjacent fragments share a cell.
pub const CELL_GAP_FACTOR: f64 = 0.5;

/// Leading lines considered when picking the header.
pub const HEADER_SCAN_DEPTH: usize = 20;

/// Fraction of the header width a data line must reach to be kept.
pub const MIN_ROW_FILL: f64 = 0.5;

/// Confidence reported for non-empty input.
pub const FIXED_CONFIDENCE: f64 = 0.85;

/// Pages extracted per chunk between progress messages.
pub const PAGE_CHUNK_SIZE: usize = 5;

/// Per-page frequency for a column start to count as a boundary.
pub const COLUMN_MIN_FREQUENCY: f64 = 0.5;
