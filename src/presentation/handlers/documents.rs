use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::application::services::IngestReport;
use crate::domain::{Session, SourceDocument};
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<SourceDocument>,
}

#[tracing::instrument(skip_all, fields(owner = %session.owner, documents = request.documents.len()))]
pub async fn ingest_documents_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    if request.documents.is_empty() {
        return Err(ApiError::BadRequest("no documents supplied".to_string()));
    }
    if request.documents.iter().any(|d| d.source.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "document source must not be empty".to_string(),
        ));
    }

    let report = state.document_index.ingest(&request.documents).await?;
    tracing::info!(
        indexed = report.indexed_documents,
        unchanged = report.unchanged_documents,
        chunks = report.indexed_chunks,
        "Documents ingested"
    );
    Ok(Json(report))
}
