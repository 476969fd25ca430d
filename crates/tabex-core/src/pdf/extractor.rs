//! Positioned text extraction using lopdf.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::content::{CidWidths, ContentWalker, DEFAULT_CID_WIDTH, FontMetrics, PageFont, number};
use super::{PdfProcessor, Result};
use crate::error::PdfError;
use crate::models::fragment::TextFragment;

/// US Letter, used when a page has no readable `MediaBox`.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// PDF text extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    skip_blank: bool,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            skip_blank: true,
        }
    }

    /// Keep or drop whitespace-only text runs.
    pub fn with_skip_blank(mut self, skip_blank: bool) -> Self {
        self.skip_blank = skip_blank;
        self
    }

    /// Extract the fragments of every page, in page order.
    pub fn extract_all(&self) -> Result<Vec<TextFragment>> {
        let mut fragments = Vec::new();
        for page in 1..=self.page_count() {
            fragments.extend(self.extract_fragments(page)?);
        }
        Ok(fragments)
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    /// Page bounding box `[x0, y0, x1, y1]`, normalized so `x0 <= x1`
    /// and `y0 <= y1`.
    fn media_box(&self, doc: &Document, page_id: ObjectId) -> [f64; 4] {
        let Some(obj) = get_inherited(doc, page_id, b"MediaBox") else {
            return DEFAULT_MEDIA_BOX;
        };

        let values: Vec<f64> = match doc.dereference(&obj) {
            Ok((_, Object::Array(items))) => items.iter().filter_map(number).collect(),
            _ => Vec::new(),
        };

        if values.len() != 4 {
            warn!("Unreadable MediaBox on page object {:?}, using default", page_id);
            return DEFAULT_MEDIA_BOX;
        }

        [
            values[0].min(values[2]),
            values[1].min(values[3]),
            values[0].max(values[2]),
            values[1].max(values[3]),
        ]
    }

    /// Widths and text encodings of the fonts available to a page, keyed
    /// by resource name.
    fn page_fonts<'d>(
        &self,
        doc: &'d Document,
        page_id: ObjectId,
    ) -> HashMap<Vec<u8>, PageFont<'d>> {
        let fonts = match doc.get_page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                warn!("Unreadable fonts on page object {:?}: {}", page_id, e);
                return HashMap::new();
            }
        };

        fonts
            .into_iter()
            .map(|(name, font)| {
                let encoding = match font.get_font_encoding(doc) {
                    Ok(encoding) => Some(encoding),
                    Err(e) => {
                        debug!(
                            "Font {} has no usable encoding ({}), decoding bytes directly",
                            String::from_utf8_lossy(&name),
                            e
                        );
                        None
                    }
                };
                let metrics = font_metrics(doc, font);
                (name, PageFont { metrics, encoding })
            })
            .collect()
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_fragments(&self, page: u32) -> Result<Vec<TextFragment>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let content_error = |reason: String| PdfError::ContentStream { page, reason };
        let data = doc
            .get_page_content(page_id)
            .map_err(|e| content_error(e.to_string()))?;
        let content = Content::decode(&data).map_err(|e| content_error(e.to_string()))?;

        let fonts = self.page_fonts(doc, page_id);
        let [x0, _, _, top] = self.media_box(doc, page_id);

        let fragments: Vec<TextFragment> = ContentWalker::new(&fonts)
            .walk(&content.operations)
            .into_iter()
            .filter(|run| !(self.skip_blank && run.text.trim().is_empty()))
            .map(|run| {
                TextFragment::new(
                    run.text,
                    run.x - x0,
                    top - run.baseline - run.height,
                    run.width,
                    run.height,
                )
            })
            .collect();

        debug!(
            "Page {}: {} operations, {} fonts -> {} fragments",
            page,
            content.operations.len(),
            fonts.len(),
            fragments.len()
        );

        Ok(fragments)
    }
}

/// Look up a page attribute, walking up the page tree for inherited ones.
fn get_inherited(doc: &Document, node_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = node_id;
    // Bounded walk; malformed trees can contain parent cycles.
    for _ in 0..64 {
        let Ok(Object::Dictionary(dict)) = doc.get_object(current) else {
            return None;
        };
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return None,
        }
    }
    None
}

fn font_metrics(doc: &Document, font: &Dictionary) -> FontMetrics {
    if matches!(font.get(b"Subtype").and_then(Object::as_name), Ok(b"Type0")) {
        return FontMetrics {
            cid: Some(cid_widths(doc, font)),
            ..FontMetrics::default()
        };
    }

    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0);

    let widths = font
        .get(b"Widths")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_array().ok())
        .map(|items| {
            items
                .iter()
                .map(|item| match doc.dereference(item) {
                    Ok((_, value)) => number(value).unwrap_or(0.0),
                    Err(_) => 0.0,
                })
                .collect()
        })
        .unwrap_or_default();

    FontMetrics {
        first_char,
        widths,
        cid: None,
    }
}

/// Read `/DW` and `/W` from the descendant CID font of a Type0 font.
///
/// `/W` mixes two forms: `c [w1 w2 ...]` gives consecutive widths from `c`,
/// `c_first c_last w` gives one width to a whole range.
fn cid_widths(doc: &Document, font: &Dictionary) -> CidWidths {
    let descendant = font
        .get_deref(b"DescendantFonts", doc)
        .and_then(Object::as_array)
        .ok()
        .and_then(|fonts| fonts.first())
        .and_then(|f| doc.dereference(f).ok())
        .and_then(|(_, f)| f.as_dict().ok());
    let Some(descendant) = descendant else {
        warn!("Type0 font without a readable descendant font");
        return CidWidths::default();
    };

    let default_width = descendant
        .get(b"DW")
        .ok()
        .and_then(number)
        .unwrap_or(DEFAULT_CID_WIDTH);

    let items: Vec<&Object> = match descendant.get_deref(b"W", doc).and_then(Object::as_array) {
        Ok(items) => items.iter().map(|item| resolve(doc, item)).collect(),
        Err(_) => Vec::new(),
    };

    let mut ranges = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(items[i]).map(|c| c as u32) else {
            break;
        };
        match items.get(i + 1) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = number(resolve(doc, width)) {
                        let code = first + offset as u32;
                        ranges.push((code, code, width));
                    }
                }
                i += 2;
            }
            Some(last) => {
                let width = items.get(i + 2).and_then(|w| number(w));
                let (Some(last), Some(width)) = (number(last), width) else {
                    break;
                };
                ranges.push((first, last as u32, width));
                i += 3;
            }
            None => break,
        }
    }

    CidWidths {
        default_width,
        ranges,
    }
}

fn resolve<'d>(doc: &'d Document, obj: &'d Object) -> &'d Object {
    doc.dereference(obj).map_or(obj, |(_, value)| value)
}
