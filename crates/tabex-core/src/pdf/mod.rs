//! PDF loading and positioned text extraction.

mod content;
mod extractor;

pub use extractor::PdfExtractor;

#[cfg(test)]
pub(crate) use extractor::tests as fixtures;

use crate::error::PdfError;
use crate::models::fragment::TextFragment;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Source of positioned text fragments, one page at a time.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the positioned text runs of a page (1-indexed).
    ///
    /// Coordinates are top-left based with `y` growing downward.
    fn extract_fragments(&self, page: u32) -> Result<Vec<TextFragment>>;
}
