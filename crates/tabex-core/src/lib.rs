//! Core library for PDF table extraction.
//!
//! This crate provides:
//! - Positioned text extraction from PDF content streams
//! - Table reconstruction via row/cell spatial clustering
//! - A chunked extraction pipeline with progress reporting
//! - A dedicated background worker speaking a small message protocol

pub mod error;
pub mod models;
pub mod pdf;
pub mod table;
pub mod worker;

pub use error::{PdfError, Result, TabexError, WorkerError};
pub use models::config::{ExtractionConfig, OutputConfig, ReconstructConfig, TabexConfig};
pub use models::fragment::TextFragment;
pub use models::table::Table;
pub use pdf::{PdfExtractor, PdfProcessor};
pub use table::{ColumnHistogram, TableReconstructor, reconstruct};
pub use worker::{ExtractRequest, Strategy, WorkerMessage, handle};

#[cfg(feature = "native")]
pub use worker::TableWorker;
