use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_chunks: Option<usize>,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let indexed_chunks = match state.document_index.chunk_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Vector store unreachable during health check");
            None
        }
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            indexed_chunks,
        }),
    )
}
