use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::{SearchResult, VectorStore, VectorStoreError};
use crate::application::services::compare_results;
use crate::domain::{Chunk, Embedding};

#[derive(Default)]
pub struct InMemoryVectorStore {
    sources: RwLock<HashMap<String, Vec<(Chunk, Embedding)>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn replace_source(
        &self,
        source: &str,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<(), VectorStoreError> {
        if chunks.len() != embeddings.len() {
            return Err(VectorStoreError::UpsertFailed(
                "chunks and embeddings count mismatch".to_string(),
            ));
        }

        let entries = chunks.iter().cloned().zip(embeddings.iter().cloned()).collect();
        self.sources.write().await.insert(source.to_string(), entries);
        Ok(())
    }

    async fn source_version(&self, source: &str) -> Result<Option<String>, VectorStoreError> {
        Ok(self
            .sources
            .read()
            .await
            .get(source)
            .and_then(|entries| entries.first())
            .map(|(chunk, _)| chunk.version.clone()))
    }

    async fn search(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        let sources = self.sources.read().await;
        let mut results: Vec<SearchResult> = sources
            .values()
            .flatten()
            .map(|(chunk, stored)| SearchResult {
                chunk: chunk.clone(),
                score: embedding.cosine_similarity(stored),
            })
            .collect();

        results.sort_by(compare_results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.sources.read().await.values().map(Vec::len).sum())
    }
}
