use std::convert::Infallible;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::{Extension, Json};
use futures::stream::StreamExt;
use serde::Deserialize;

use super::conversations::parse_conversation_id;
use crate::domain::Session;
use crate::infrastructure::framing::event_payload;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: String,
}

/// Streams the reply as `data: {"token": ...}` blocks, ending with at most
/// one `data: {"error": ...}` block. Validation failures are plain JSON
/// errors and leave the conversation untouched.
#[tracing::instrument(skip_all, fields(owner = %session.owner, conversation_id = %request.conversation_id))]
pub async fn chat_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id = parse_conversation_id(&request.conversation_id)?;

    let chat_stream = state
        .chat_service
        .send_message(&session, conversation_id, &request.message)
        .await?;

    let events = chat_stream
        .map(|event| Ok::<_, Infallible>(Event::default().data(event_payload(&event))));

    Ok(Sse::new(events))
}
