//! Batch progress events streamed to callers.
//!
//! Events are ephemeral: the batch sequencer emits them in a fixed order
//! (progress before each item, result after each item, one final complete)
//! and nothing stores them. The wire framing is newline-delimited JSON with
//! an SSE-style `data: ` marker, matching what streaming batch clients read.

use serde::{Deserialize, Serialize};

use crate::models::ConversionResult;

/// Marker prefixed to every framed event payload.
pub const EVENT_MARKER: &str = "data: ";

/// An event emitted by the batch sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Emitted before an item starts processing
    #[serde(rename_all = "camelCase")]
    Progress {
        /// 1-based position of the item about to be processed
        current: usize,
        total: usize,
        url: String,
        message: String,
    },

    /// Emitted after an item finishes (successfully or not)
    #[serde(rename_all = "camelCase")]
    Result {
        /// 0-based index of the finished item
        index: usize,
        current: usize,
        total: usize,
        result: ConversionResult,
    },

    /// Emitted once, after the last item
    #[serde(rename_all = "camelCase")]
    Complete {
        total: usize,
        success_count: usize,
        results: Vec<ConversionResult>,
    },
}

impl BatchEvent {
    /// Progress event for the item at `index` (0-based).
    pub fn progress(index: usize, total: usize, url: impl Into<String>) -> Self {
        let url = url.into();
        BatchEvent::Progress {
            current: index + 1,
            total,
            message: format!("Processing URL {}/{}...", index + 1, total),
            url,
        }
    }

    /// Result event for the item at `index` (0-based).
    pub fn result(index: usize, total: usize, result: ConversionResult) -> Self {
        BatchEvent::Result {
            index,
            current: index + 1,
            total,
            result,
        }
    }

    /// Serialize into a `data: {json}\n\n` frame for a streaming response.
    pub fn to_frame(&self) -> String {
        let payload = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{}{}\n\n", EVENT_MARKER, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_fields() {
        let event = BatchEvent::progress(0, 3, "https://example.com");
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["type"], "progress");
        assert_eq!(json["current"], 1);
        assert_eq!(json["total"], 3);
        assert!(json["message"].as_str().unwrap_or("").contains("1/3"));
    }

    #[test]
    fn test_complete_event_wire_names() {
        let event = BatchEvent::Complete {
            total: 2,
            success_count: 1,
            results: vec![],
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["type"], "complete");
        assert_eq!(json["successCount"], 1);
    }

    #[test]
    fn test_frame_format() {
        let event = BatchEvent::progress(1, 2, "https://example.com");
        let frame = event.to_frame();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_result_event_embeds_result() {
        let result = ConversionResult::failure("https://bad.example", "nope");
        let event = BatchEvent::result(1, 2, result);
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["type"], "result");
        assert_eq!(json["index"], 1);
        assert_eq!(json["result"]["success"], false);
    }
}
