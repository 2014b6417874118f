use async_trait::async_trait;

use super::{SearchResult, VectorStoreError};
use crate::domain::{Chunk, Embedding};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Atomically swaps every stored chunk of `source` for the given ones.
    async fn replace_source(
        &self,
        source: &str,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<(), VectorStoreError>;

    /// Version currently stored for `source`, if any.
    async fn source_version(&self, source: &str) -> Result<Option<String>, VectorStoreError>;

    async fn search(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;
}
