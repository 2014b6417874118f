use serde_json::json;

use super::sse_line_buffer::SseLineBuffer;
use crate::domain::StreamEvent;

const DATA_PREFIX: &str = "data: ";

/// JSON body of an event: `{"token": ...}` or `{"error": ...}`.
pub fn event_payload(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Token(text) => json!({ "token": text }).to_string(),
        StreamEvent::Error(message) => json!({ "error": message }).to_string(),
    }
}

pub fn encode_event(event: &StreamEvent) -> String {
    format!("{}{}\n\n", DATA_PREFIX, event_payload(event))
}

/// Incremental decoder for `data: <json>` blocks.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: SseLineBuffer,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes every block completed by `bytes`. A trailing partial block is
    /// retained for the next call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, MalformedEvent>> {
        self.buffer.push(bytes).iter().map(|b| parse_block(b)).collect()
    }

    pub fn finish(&mut self) -> Option<Result<StreamEvent, MalformedEvent>> {
        self.buffer.finish().map(|b| parse_block(&b))
    }
}

/// Decodes a complete body, logging and skipping malformed blocks.
pub fn decode_all(bytes: &[u8]) -> Vec<StreamEvent> {
    let mut decoder = EventDecoder::new();
    let mut results = decoder.push(bytes);
    results.extend(decoder.finish());

    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(reason = %e.reason, "Skipping malformed event block");
                None
            }
        })
        .collect()
}

fn parse_block(block: &str) -> Result<StreamEvent, MalformedEvent> {
    let payload = block
        .strip_prefix(DATA_PREFIX)
        .filter(|p| !p.contains('\n'))
        .ok_or_else(|| MalformedEvent::new(block, "expected a single `data: ` line"))?;

    serde_json::from_str::<StreamEvent>(payload)
        .map_err(|e| MalformedEvent::new(block, e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event block: {reason}")]
pub struct MalformedEvent {
    pub block: String,
    pub reason: String,
}

impl MalformedEvent {
    fn new(block: &str, reason: impl Into<String>) -> Self {
        Self {
            block: block.to_string(),
            reason: reason.into(),
        }
    }
}
