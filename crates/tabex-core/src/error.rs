//! Error types for the tabex-core library.

use thiserror::Error;

/// Main error type for the tabex library.
#[derive(Error, Debug)]
pub enum TabexError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Background worker error.
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Extraction reported failure through the worker protocol.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF loading and text extraction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to decode or walk a page content stream.
    #[error("failed to read content stream of page {page}: {reason}")]
    ContentStream { page: u32, reason: String },

    /// The PDF is encrypted and cannot be opened with an empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors raised by the background extraction worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// The worker thread has exited and no longer accepts requests.
    #[error("worker channel disconnected")]
    Disconnected,

    /// Extraction panicked; the payload message when it had one.
    #[error("extraction panicked: {0}")]
    Panicked(String),
}

/// Result type for the tabex library.
pub type Result<T> = std::result::Result<T, TabexError>;
