use serde::Deserialize;
use sha2::{Digest, Sha256};

/// A corpus document as handed to the index: where it came from and its text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Content digest; re-ingesting identical text yields the same version.
    pub fn version(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }
}
