use async_trait::async_trait;

use crate::application::ports::{TextSplitter, TextSplitterError};
use crate::domain::{Chunk, SourceDocument};

/// Tried in order when looking for a place to end a chunk.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Fixed-size character windows with overlap. A window is shortened to end
/// on the strongest separator found in its second half.
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, TextSplitterError> {
        if chunk_size == 0 {
            return Err(TextSplitterError::SplittingFailed(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(TextSplitterError::SplittingFailed(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    fn window_end(&self, chars: &[char], start: usize) -> usize {
        let hard_end = (start + self.chunk_size).min(chars.len());
        if hard_end == chars.len() {
            return hard_end;
        }

        let min_end = start + self.chunk_size / 2;
        for separator in SEPARATORS {
            let sep: Vec<char> = separator.chars().collect();
            let found = (min_end..=hard_end.saturating_sub(sep.len()))
                .rev()
                .find(|&i| chars[i..i + sep.len()] == sep[..]);
            if let Some(i) = found {
                return i + sep.len();
            }
        }
        hard_end
    }
}

#[async_trait]
impl TextSplitter for RecursiveCharacterSplitter {
    async fn split(&self, document: &SourceDocument) -> Result<Vec<Chunk>, TextSplitterError> {
        let chars: Vec<char> = document.text.chars().collect();
        let version = document.version();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < chars.len() {
            let end = self.window_end(&chars, start);
            let text: String = chars[start..end].iter().collect();

            if !text.trim().is_empty() {
                chunks.push(Chunk::new(
                    text,
                    document.source.clone(),
                    version.clone(),
                    chunks.len(),
                    start,
                ));
            }

            if end == chars.len() {
                break;
            }
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        Ok(chunks)
    }
}
