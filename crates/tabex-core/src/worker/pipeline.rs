//! Stateless request handler: chunked page extraction, then reconstruction.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use super::{ExtractRequest, WorkerMessage};
use crate::error::{Result, WorkerError};
use crate::models::config::TabexConfig;
use crate::models::fragment::TextFragment;
use crate::models::table::Table;
use crate::pdf::{self, PdfExtractor, PdfProcessor};
use crate::table::TableReconstructor;

/// Handle one request with the lopdf-backed extractor.
///
/// `emit` receives every message of the request, the last one terminal.
pub fn handle(request: ExtractRequest, config: &TabexConfig, emit: impl FnMut(WorkerMessage)) {
    let processor =
        PdfExtractor::new().with_skip_blank(config.extraction.skip_blank_fragments);
    handle_with(processor, request, config, emit);
}

/// Handle one request with a caller-supplied PDF processor.
///
/// A panic while loading or extracting is reported as the request's
/// `error` message instead of unwinding into the caller.
pub fn handle_with<P>(
    processor: P,
    request: ExtractRequest,
    config: &TabexConfig,
    mut emit: impl FnMut(WorkerMessage),
) where
    P: PdfProcessor + Sync,
{
    debug!(
        "Handling request: {} bytes, strategy {:?}",
        request.file_buffer.len(),
        request.strategy
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run(processor, &request.file_buffer, config, &mut emit)
    }));

    match outcome {
        Ok(Ok(table)) => emit(WorkerMessage::Complete { data: table }),
        Ok(Err(e)) => {
            warn!("Extraction failed: {}", e);
            emit(WorkerMessage::Error {
                error: e.to_string(),
            });
        }
        Err(payload) => {
            let e = WorkerError::Panicked(panic_message(payload.as_ref()));
            error!("{}", e);
            emit(WorkerMessage::Error {
                error: e.to_string(),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run<P>(
    mut processor: P,
    data: &[u8],
    config: &TabexConfig,
    emit: &mut impl FnMut(WorkerMessage),
) -> Result<Table>
where
    P: PdfProcessor + Sync,
{
    processor.load(data)?;
    let page_count = processor.page_count();

    let fragments = collect_fragments(
        &processor,
        page_count,
        config.extraction.page_chunk_size,
        |value| emit(WorkerMessage::Progress { value }),
    )?;

    let table = TableReconstructor::new()
        .with_config(config.reconstruct.clone())
        .reconstruct(&fragments, page_count);

    Ok(table)
}

/// Extract the fragments of pages `1..=page_count` in chunks of
/// `chunk_size`, in page order.
///
/// Pages of a chunk are extracted concurrently and all must succeed; the
/// first failure aborts the whole extraction. `on_progress` runs once per
/// completed chunk with `min(pages_done / page_count, 1)`.
pub fn collect_fragments<P>(
    processor: &P,
    page_count: u32,
    chunk_size: usize,
    mut on_progress: impl FnMut(f64),
) -> pdf::Result<Vec<TextFragment>>
where
    P: PdfProcessor + Sync,
{
    let pages: Vec<u32> = (1..=page_count).collect();
    let mut fragments = Vec::new();
    let mut done = 0usize;

    for chunk in pages.chunks(chunk_size.max(1)) {
        for page_fragments in extract_chunk(processor, chunk)? {
            fragments.extend(page_fragments);
        }
        done += chunk.len();
        on_progress(progress(done, page_count));
    }

    debug!("Collected {} fragments from {} pages", fragments.len(), page_count);
    Ok(fragments)
}

fn progress(done: usize, total: u32) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (done as f64 / total as f64).min(1.0)
}

#[cfg(feature = "native")]
fn extract_chunk<P>(processor: &P, pages: &[u32]) -> pdf::Result<Vec<Vec<TextFragment>>>
where
    P: PdfProcessor + Sync,
{
    use rayon::prelude::*;

    pages
        .par_iter()
        .map(|&page| processor.extract_fragments(page))
        .collect()
}

#[cfg(not(feature = "native"))]
fn extract_chunk<P>(processor: &P, pages: &[u32]) -> pdf::Result<Vec<Vec<TextFragment>>>
where
    P: PdfProcessor + Sync,
{
    pages
        .iter()
        .map(|&page| processor.extract_fragments(page))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::pdf::fixtures::{Run, build_pdf};
    use pretty_assertions::assert_eq;

    /// In-memory document: one fragment list per page.
    struct FakePdf {
        pages: Vec<Vec<TextFragment>>,
        failing_page: Option<u32>,
        panicking_page: Option<u32>,
    }

    impl FakePdf {
        fn new(pages: Vec<Vec<TextFragment>>) -> Self {
            Self {
                pages,
                failing_page: None,
                panicking_page: None,
            }
        }
    }

    impl PdfProcessor for FakePdf {
        fn load(&mut self, data: &[u8]) -> pdf::Result<()> {
            if data != b"%PDF" {
                return Err(PdfError::Parse("bad header".to_string()));
            }
            if self.pages.is_empty() {
                return Err(PdfError::NoPages);
            }
            Ok(())
        }

        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn extract_fragments(&self, page: u32) -> pdf::Result<Vec<TextFragment>> {
            if self.panicking_page == Some(page) {
                panic!("xref offset out of bounds on page {}", page);
            }
            if self.failing_page == Some(page) {
                return Err(PdfError::ContentStream {
                    page,
                    reason: "corrupt stream".to_string(),
                });
            }
            Ok(self.pages[(page - 1) as usize].clone())
        }
    }

    fn page_with(text: &str, y: f64) -> Vec<TextFragment> {
        vec![TextFragment::new(text, 0.0, y, 20.0, 10.0)]
    }

    fn collect(processor: impl PdfProcessor + Sync, data: &[u8]) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        handle_with(
            processor,
            ExtractRequest::new(data.to_vec()),
            &TabexConfig::default(),
            |m| messages.push(m),
        );
        messages
    }

    fn progress_values(messages: &[WorkerMessage]) -> Vec<f64> {
        messages
            .iter()
            .filter_map(|m| match m {
                WorkerMessage::Progress { value } => Some(*value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_progress_per_chunk_then_complete() {
        let pages = (0..12).map(|i| page_with(&format!("p{}", i), i as f64 * 20.0)).collect();
        let messages = collect(FakePdf::new(pages), b"%PDF");

        assert_eq!(progress_values(&messages), vec![5.0 / 12.0, 10.0 / 12.0, 1.0]);
        assert_eq!(messages.len(), 4);
        let Some(WorkerMessage::Complete { data }) = messages.last() else {
            panic!("expected complete, got {:?}", messages.last());
        };
        assert_eq!(data.headers, vec!["p0".to_string()]);
        assert_eq!(data.rows.len(), 11);
        assert_eq!(data.rows[10], vec!["p11".to_string()]);
    }

    #[test]
    fn test_single_chunk_document() {
        let messages = collect(FakePdf::new(vec![page_with("A", 0.0)]), b"%PDF");
        assert_eq!(progress_values(&messages), vec![1.0]);
        assert!(matches!(messages[1], WorkerMessage::Complete { .. }));
    }

    #[test]
    fn test_page_failure_aborts_with_single_error() {
        let pages = (0..8).map(|i| page_with("x", i as f64 * 20.0)).collect();
        let mut processor = FakePdf::new(pages);
        processor.failing_page = Some(7);

        let messages = collect(processor, b"%PDF");
        // First chunk (pages 1-5) reports progress, second chunk fails.
        assert_eq!(progress_values(&messages), vec![5.0 / 8.0]);
        assert_eq!(messages.len(), 2);
        match &messages[1] {
            WorkerMessage::Error { error } => assert!(error.contains("page 7")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_page_panic_becomes_single_error() {
        let pages = (0..8).map(|i| page_with("x", i as f64 * 20.0)).collect();
        let mut processor = FakePdf::new(pages);
        processor.panicking_page = Some(3);

        let messages = collect(processor, b"%PDF");
        assert!(progress_values(&messages).is_empty());
        assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
        match messages.last() {
            Some(WorkerMessage::Error { error }) => {
                assert!(error.contains("panicked"));
                assert!(error.contains("out of bounds on page 3"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_handler_usable_after_panic() {
        let mut exploding = FakePdf::new(vec![page_with("A", 0.0)]);
        exploding.panicking_page = Some(1);
        let first = collect(exploding, b"%PDF");
        assert!(matches!(first.as_slice(), [WorkerMessage::Error { .. }]));

        let second = collect(FakePdf::new(vec![page_with("A", 0.0)]), b"%PDF");
        assert!(matches!(second.last(), Some(WorkerMessage::Complete { .. })));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[test]
    fn test_load_failure_emits_only_error() {
        let messages = collect(FakePdf::new(vec![page_with("A", 0.0)]), b"garbage");
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], WorkerMessage::Error { error } if error.contains("bad header")));
    }

    #[test]
    fn test_empty_pages_yield_empty_table() {
        let messages = collect(FakePdf::new(vec![Vec::new(), Vec::new()]), b"%PDF");
        assert_eq!(
            messages.last(),
            Some(&WorkerMessage::Complete { data: Table::empty() })
        );
    }

    #[test]
    fn test_progress_monotonic_and_bounded() {
        let pages = (0..23).map(|_| Vec::new()).collect();
        let messages = collect(FakePdf::new(pages), b"%PDF");
        let values = progress_values(&messages);
        assert_eq!(values.len(), 5);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(values.last(), Some(&1.0));
    }

    #[test]
    fn test_collect_fragments_keeps_page_order() {
        let pages = (0..7).map(|i| page_with(&format!("p{}", i), 0.0)).collect();
        let processor = FakePdf::new(pages);
        let fragments = collect_fragments(&processor, 7, 3, |_| {}).unwrap();
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6"]);
    }

    #[test]
    fn test_handle_real_pdf() {
        let data = build_pdf(&[
            vec![
                Run { text: "Name", x: 50, y: 700 },
                Run { text: "Amount", x: 200, y: 700 },
                Run { text: "Rent", x: 50, y: 680 },
                Run { text: "1200", x: 200, y: 680 },
            ],
            vec![
                Run { text: "Power", x: 50, y: 660 },
                Run { text: "85", x: 200, y: 660 },
            ],
        ]);

        let mut messages = Vec::new();
        handle(ExtractRequest::new(data), &TabexConfig::default(), |m| {
            messages.push(m)
        });

        assert_eq!(progress_values(&messages), vec![1.0]);
        let Some(WorkerMessage::Complete { data }) = messages.last() else {
            panic!("expected complete, got {:?}", messages.last());
        };
        assert_eq!(data.headers, vec!["Name", "Amount"]);
        assert_eq!(data.get(0, "Amount"), Some("1200"));
        assert_eq!(data.get(1, "Name"), Some("Power"));
        assert_eq!(data.confidence, 0.85);
    }

    #[test]
    fn test_handle_garbage_reports_parse_error() {
        let mut messages = Vec::new();
        handle(
            ExtractRequest::new(b"definitely not a pdf".to_vec()),
            &TabexConfig::default(),
            |m| messages.push(m),
        );
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], WorkerMessage::Error { error } if error.contains("parse")));
    }
}
