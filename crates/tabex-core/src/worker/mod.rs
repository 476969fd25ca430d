//! Extraction worker: message protocol, request handler and background thread.
//!
//! One request produces a stream of messages: zero or more `progress`
//! messages in chunk order, then exactly one terminal `complete` or
//! `error` message.

mod pipeline;
#[cfg(feature = "native")]
mod thread;

pub use pipeline::{collect_fragments, handle, handle_with};
#[cfg(feature = "native")]
pub use thread::TableWorker;

use serde::{Deserialize, Serialize};

use crate::models::table::Table;

/// Extraction strategy selector. Reserved: every value behaves as `auto`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Spatial clustering of positioned text.
    #[default]
    #[serde(other)]
    Auto,
}

/// Inbound request: the document to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// Raw PDF bytes.
    pub file_buffer: Vec<u8>,
    /// Reserved selector.
    #[serde(default)]
    pub strategy: Strategy,
}

impl ExtractRequest {
    /// Create a request with the default strategy.
    pub fn new(file_buffer: Vec<u8>) -> Self {
        Self {
            file_buffer,
            strategy: Strategy::default(),
        }
    }
}

/// Outbound message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Fraction of pages extracted so far, in `[0, 1]`.
    Progress { value: f64 },
    /// Terminal success.
    Complete { data: Table },
    /// Terminal failure with a human-readable message.
    Error { error: String },
}

impl WorkerMessage {
    /// Check whether no message follows this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_wire_format() {
        let progress = serde_json::to_value(WorkerMessage::Progress { value: 0.5 }).unwrap();
        assert_eq!(progress, serde_json::json!({"type": "progress", "value": 0.5}));

        let error = serde_json::to_value(WorkerMessage::Error {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(error, serde_json::json!({"type": "error", "error": "boom"}));

        let complete = serde_json::to_value(WorkerMessage::Complete {
            data: Table::empty(),
        })
        .unwrap();
        assert_eq!(complete["type"], "complete");
        assert_eq!(complete["data"]["headers"], serde_json::json!([]));
    }

    #[test]
    fn test_request_from_json() {
        let request: ExtractRequest =
            serde_json::from_str(r#"{"fileBuffer":[37,80,68,70],"strategy":"lattice"}"#).unwrap();
        assert_eq!(request.file_buffer, b"%PDF".to_vec());
        assert_eq!(request.strategy, Strategy::Auto);

        let request: ExtractRequest = serde_json::from_str(r#"{"fileBuffer":[]}"#).unwrap();
        assert_eq!(request.strategy, Strategy::Auto);
    }

    #[test]
    fn test_is_terminal() {
        assert!(!WorkerMessage::Progress { value: 1.0 }.is_terminal());
        assert!(WorkerMessage::Error { error: String::new() }.is_terminal());
        assert!(WorkerMessage::Complete { data: Table::empty() }.is_terminal());
    }
}
