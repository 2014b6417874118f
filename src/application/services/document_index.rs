use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::application::ports::{
    Embedder, EmbedderError, SearchResult, TextSplitter, TextSplitterError, VectorStore,
    VectorStoreError,
};
use crate::domain::{Chunk, Embedding, SourceDocument};
use crate::infrastructure::observability::sanitize_prompt;

// Never equals a content digest, so a document stored with skipped chunks is
// re-embedded by the next ingest of the same content.
const PARTIAL_VERSION_SUFFIX: &str = "+partial";

/// Chunked, embedded, source-attributed corpus with similarity lookup.
pub struct DocumentIndex {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    text_splitter: Arc<dyn TextSplitter>,
    dimension: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub indexed_documents: usize,
    pub unchanged_documents: usize,
    pub failed_documents: usize,
    pub indexed_chunks: usize,
    pub skipped_chunks: usize,
}

struct PreparedDocument {
    source: String,
    chunks: Vec<Chunk>,
    embeddings: Vec<Embedding>,
}

impl DocumentIndex {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        text_splitter: Arc<dyn TextSplitter>,
        dimension: usize,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            text_splitter,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn chunk_count(&self) -> Result<usize, VectorStoreError> {
        self.vector_store.count().await
    }

    /// Ingests a batch of documents. Every document is split and embedded
    /// before anything is written, so a fatal error leaves the index as it was.
    #[tracing::instrument(skip(self, corpus), fields(documents = corpus.len()))]
    pub async fn ingest(&self, corpus: &[SourceDocument]) -> Result<IngestReport, IngestionError> {
        let mut report = IngestReport::default();
        let mut prepared = Vec::new();
        let mut attempted_chunks = 0;

        for document in corpus {
            let version = document.version();
            let stored = self
                .vector_store
                .source_version(&document.source)
                .await
                .map_err(IngestionError::Storage)?;

            if stored.as_deref() == Some(version.as_str()) {
                tracing::debug!(source = %document.source, "Document unchanged, skipping");
                report.unchanged_documents += 1;
                continue;
            }

            let chunks = self
                .text_splitter
                .split(document)
                .await
                .map_err(IngestionError::Splitting)?;
            attempted_chunks += chunks.len();

            let (mut chunks, embeddings, skipped) = self.embed_chunks(chunks).await;
            report.skipped_chunks += skipped;

            if chunks.is_empty() && skipped > 0 {
                tracing::warn!(source = %document.source, "No chunk of document could be embedded");
                report.failed_documents += 1;
                continue;
            }

            if skipped > 0 {
                tracing::warn!(
                    source = %document.source,
                    skipped,
                    "Document only partially embedded, it will be retried on next ingest"
                );
                let partial_version = format!("{}{}", version, PARTIAL_VERSION_SUFFIX);
                for chunk in &mut chunks {
                    chunk.version = partial_version.clone();
                }
            }

            prepared.push(PreparedDocument {
                source: document.source.clone(),
                chunks,
                embeddings,
            });
        }

        if attempted_chunks > 0 && report.skipped_chunks == attempted_chunks {
            tracing::error!(chunks = attempted_chunks, "Every chunk in batch failed to embed");
            return Err(IngestionError::NoEmbeddings(attempted_chunks));
        }

        for document in prepared {
            self.vector_store
                .replace_source(&document.source, &document.chunks, &document.embeddings)
                .await
                .map_err(IngestionError::Storage)?;

            tracing::info!(
                source = %document.source,
                chunks = document.chunks.len(),
                "Document indexed"
            );
            report.indexed_documents += 1;
            report.indexed_chunks += document.chunks.len();
        }

        Ok(report)
    }

    /// Embeds in one batch call, falling back to one call per chunk so a
    /// single bad chunk only costs itself.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> (Vec<Chunk>, Vec<Embedding>, usize) {
        if chunks.is_empty() {
            return (chunks, Vec::new(), 0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let batch = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == chunks.len() => embeddings
                .into_iter()
                .map(Ok)
                .collect::<Vec<Result<Embedding, EmbedderError>>>(),
            Ok(embeddings) => {
                tracing::warn!(
                    expected = chunks.len(),
                    received = embeddings.len(),
                    "Batch embedding count mismatch, embedding chunks individually"
                );
                self.embed_individually(&texts).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Batch embedding failed, embedding chunks individually");
                self.embed_individually(&texts).await
            }
        };

        let mut kept_chunks = Vec::with_capacity(chunks.len());
        let mut kept_embeddings = Vec::with_capacity(chunks.len());
        let mut skipped = 0;

        for (chunk, result) in chunks.into_iter().zip(batch) {
            match result {
                Ok(embedding) if embedding.dimensions() == self.dimension => {
                    kept_chunks.push(chunk);
                    kept_embeddings.push(embedding);
                }
                Ok(embedding) => {
                    tracing::warn!(
                        source = %chunk.source,
                        offset = chunk.offset,
                        expected = self.dimension,
                        actual = embedding.dimensions(),
                        "Embedding dimension mismatch, skipping chunk"
                    );
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        source = %chunk.source,
                        offset = chunk.offset,
                        error = %e,
                        "Chunk embedding failed, skipping chunk"
                    );
                    skipped += 1;
                }
            }
        }

        (kept_chunks, kept_embeddings, skipped)
    }

    async fn embed_individually(&self, texts: &[&str]) -> Vec<Result<Embedding, EmbedderError>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embedder.embed(text).await);
        }
        results
    }

    /// Returns up to `k` chunks nearest to `text`. An empty index is an empty
    /// result; an embedding failure is an error.
    #[tracing::instrument(skip(self, text), fields(query = %sanitize_prompt(text)))]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        let query_embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(RetrievalError::Embedding)?;

        if query_embedding.dimensions() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.dimensions(),
            });
        }

        let mut results = self
            .vector_store
            .search(&query_embedding, k)
            .await
            .map_err(RetrievalError::Search)?;

        results.sort_by(compare_results);
        results.truncate(k);

        tracing::debug!(results = results.len(), "Index query completed");
        Ok(results)
    }
}

/// Descending score; ties broken by source then offset so ordering is stable.
pub fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.chunk.source.cmp(&b.chunk.source))
        .then_with(|| a.chunk.offset.cmp(&b.chunk.offset))
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("text splitting: {0}")]
    Splitting(TextSplitterError),
    #[error("no chunk could be embedded ({0} attempted)")]
    NoEmbeddings(usize),
    #[error("storage: {0}")]
    Storage(VectorStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding: {0}")]
    Embedding(EmbedderError),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("search: {0}")]
    Search(VectorStoreError),
}
