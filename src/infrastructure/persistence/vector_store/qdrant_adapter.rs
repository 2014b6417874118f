use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::ports::{SearchResult, VectorStore, VectorStoreError};
use crate::domain::{Chunk, ChunkId, Embedding};

const SOURCE_FIELD: &str = "source";
const VERSION_FIELD: &str = "version";

pub struct QdrantAdapter {
    client: Arc<Qdrant>,
    collection_name: String,
}

impl QdrantAdapter {
    pub async fn new(url: &str, collection_name: String) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            collection_name,
        })
    }

    /// Creates the collection with cosine distance and keyword indexes on
    /// source and version, unless it already exists.
    #[instrument(skip(self), fields(collection = %self.collection_name))]
    pub async fn ensure_collection(&self, dimension: usize) -> Result<bool, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;
        if exists {
            info!("Collection already exists");
            return Ok(false);
        }

        let vectors_config =
            VectorsConfig::from(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name).vectors_config(vectors_config),
            )
            .await
            .map_err(|e| VectorStoreError::CollectionCreationFailed(e.to_string()))?;

        for field in [SOURCE_FIELD, VERSION_FIELD] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection_name,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| VectorStoreError::CollectionCreationFailed(e.to_string()))?;
        }

        info!(dimension = dimension, "Collection created");
        Ok(true)
    }

    fn point_from_chunk(chunk: &Chunk, embedding: &Embedding) -> PointStruct {
        let mut payload: HashMap<String, serde_json::Value> = HashMap::new();
        payload.insert(SOURCE_FIELD.to_string(), chunk.source.clone().into());
        payload.insert(VERSION_FIELD.to_string(), chunk.version.clone().into());
        payload.insert("text".to_string(), chunk.text.clone().into());
        payload.insert("offset".to_string(), (chunk.offset as u64).into());

        PointStruct::new(
            PointId::from(chunk.id.as_uuid().to_string()),
            embedding.values.clone(),
            payload,
        )
    }
}

#[async_trait]
impl VectorStore for QdrantAdapter {
    /// New points go in first, then everything of the source carrying another
    /// version is deleted, so readers never see the source vanish.
    #[instrument(skip(self, chunks, embeddings), fields(collection = %self.collection_name, count = chunks.len()))]
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

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Self::point_from_chunk(chunk, embedding))
            .collect();

        if !points.is_empty() {
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
                .await
                .map_err(|e| VectorStoreError::UpsertFailed(e.to_string()))?;
        }

        let mut stale = Filter::must([Condition::matches(SOURCE_FIELD, source.to_string())]);
        if let Some(version) = chunks.first().map(|c| c.version.clone()) {
            stale.must_not = vec![Condition::matches(VERSION_FIELD, version)];
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(stale)
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;

        info!(source = %source, count = chunks.len(), "Source replaced");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection_name))]
    async fn source_version(&self, source: &str) -> Result<Option<String>, VectorStoreError> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection_name)
                    .filter(Filter::must([Condition::matches(
                        SOURCE_FIELD,
                        source.to_string(),
                    )]))
                    .limit(1)
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorStoreError::SearchFailed(e.to_string()))?;

        Ok(response.result.into_iter().next().and_then(|point| {
            point
                .payload
                .get(VERSION_FIELD)
                .and_then(|v| v.as_str())
                .map(|v| v.to_string())
        }))
    }

    #[instrument(skip(self, embedding), fields(collection = %self.collection_name, top_k = top_k))]
    async fn search(
        &self,
        embedding: &Embedding,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(
                    &self.collection_name,
                    embedding.values.clone(),
                    top_k as u64,
                )
                .with_payload(true),
            )
            .await
            .map_err(|e| VectorStoreError::SearchFailed(e.to_string()))?;

        let results = search_result
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload;

                let chunk_id = match point.id?.point_id_options? {
                    PointIdOptions::Uuid(uuid) => Uuid::parse_str(&uuid).ok()?,
                    PointIdOptions::Num(_) => return None,
                };

                let chunk = Chunk {
                    id: ChunkId::from_uuid(chunk_id),
                    text: payload.get("text")?.as_str()?.to_string(),
                    source: payload.get(SOURCE_FIELD)?.as_str()?.to_string(),
                    version: payload.get(VERSION_FIELD)?.as_str()?.to_string(),
                    offset: payload.get("offset")?.as_integer()? as usize,
                };

                Some(SearchResult {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await
            .map_err(|e| VectorStoreError::SearchFailed(e.to_string()))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
