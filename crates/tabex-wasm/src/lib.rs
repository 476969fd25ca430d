//! WASM bindings for PDF table extraction.
//!
//! This crate provides WebAssembly bindings for use in browsers and Node.js.
//! Tables cross the boundary as plain JS objects: `headers` is an array of
//! strings and every row is an object keyed by header.

use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

use tabex_core::models::config::TabexConfig;
use tabex_core::models::fragment::TextFragment;
use tabex_core::table::TableReconstructor;
use tabex_core::{ExtractRequest, WorkerMessage, handle};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Reconstruct a table from positioned text fragments.
///
/// `fragments` is an array of `{ text, x, y, width, height }` objects in
/// top-left page coordinates.
#[wasm_bindgen]
pub fn reconstruct_table(fragments: JsValue, page_count: u32) -> Result<JsValue, JsValue> {
    reconstruct_with(&TabexConfig::default(), fragments, page_count)
}

/// Extract the table of a PDF document.
///
/// `on_message` is called with every protocol message in order:
/// `{ type: "progress", value }` once per page chunk, then exactly one
/// `{ type: "complete", data }` or `{ type: "error", error }`.
#[wasm_bindgen]
pub fn extract_table(file_buffer: &[u8], on_message: &js_sys::Function) -> Result<(), JsValue> {
    extract_with(&TabexConfig::default(), file_buffer, on_message)
}

/// Table extractor class carrying its own configuration.
#[wasm_bindgen]
pub struct TableExtractor {
    config: TabexConfig,
}

#[wasm_bindgen]
impl TableExtractor {
    /// Create an extractor with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            config: TabexConfig::default(),
        }
    }

    /// Create an extractor from a configuration object.
    ///
    /// Missing sections and fields fall back to their defaults.
    #[wasm_bindgen]
    pub fn with_config(config: JsValue) -> Result<TableExtractor, JsValue> {
        let config: TabexConfig = serde_wasm_bindgen::from_value(config)?;
        config.validate().map_err(to_js_error)?;
        Ok(Self { config })
    }

    /// Current configuration as a plain object.
    #[wasm_bindgen]
    pub fn config(&self) -> Result<JsValue, JsValue> {
        to_js(&self.config)
    }

    /// Set the vertical row-clustering tolerance.
    #[wasm_bindgen]
    pub fn set_row_tolerance(&mut self, tolerance: f64) -> Result<(), JsValue> {
        let mut config = self.config.clone();
        config.reconstruct.row_tolerance = tolerance;
        config.validate().map_err(to_js_error)?;
        self.config = config;
        Ok(())
    }

    /// Enable the column-frequency histogram (diagnostics only).
    #[wasm_bindgen]
    pub fn set_column_histogram(&mut self, enabled: bool) {
        self.config.reconstruct.column_histogram = enabled;
    }

    /// Reconstruct a table from positioned text fragments.
    #[wasm_bindgen]
    pub fn reconstruct(&self, fragments: JsValue, page_count: u32) -> Result<JsValue, JsValue> {
        reconstruct_with(&self.config, fragments, page_count)
    }

    /// Extract the table of a PDF document, reporting messages to `on_message`.
    #[wasm_bindgen]
    pub fn extract(&self, file_buffer: &[u8], on_message: &js_sys::Function) -> Result<(), JsValue> {
        extract_with(&self.config, file_buffer, on_message)
    }
}

impl Default for TableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn reconstruct_with(
    config: &TabexConfig,
    fragments: JsValue,
    page_count: u32,
) -> Result<JsValue, JsValue> {
    let fragments: Vec<TextFragment> = serde_wasm_bindgen::from_value(fragments)?;

    let table = TableReconstructor::new()
        .with_config(config.reconstruct.clone())
        .reconstruct(&fragments, page_count);

    to_js(&table)
}

fn extract_with(
    config: &TabexConfig,
    file_buffer: &[u8],
    on_message: &js_sys::Function,
) -> Result<(), JsValue> {
    let mut callback_error = None;

    handle(ExtractRequest::new(file_buffer.to_vec()), config, |message: WorkerMessage| {
        if callback_error.is_some() {
            return;
        }
        let delivered = to_js(&message).and_then(|value| on_message.call1(&JsValue::NULL, &value));
        if let Err(e) = delivered {
            web_sys::console::warn_2(
                &JsValue::from_str("tabex: on_message failed, dropping remaining messages:"),
                &e,
            );
            callback_error = Some(e);
        }
    });

    match callback_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Serialize maps as plain objects rather than `Map` instances.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn to_js_error(error: tabex_core::TabexError) -> JsValue {
    JsValue::from_str(&error.to_string())
}
