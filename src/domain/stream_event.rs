use serde::{Deserialize, Serialize};

/// One unit of the client-facing event stream.
///
/// Serializes as `{"token": "..."}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEvent {
    Token(String),
    Error(String),
}

impl StreamEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }
}
