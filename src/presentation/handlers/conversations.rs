use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::application::services::derive_title;
use crate::domain::{ConversationId, Session};
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct ConversationListItem {
    pub id: String,
    pub title: String,
}

#[derive(Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationListItem>,
}

#[derive(Serialize)]
pub struct CreateConversationResponse {
    pub conversation_id: String,
}

#[derive(Serialize)]
pub struct HistoryEntry {
    pub text: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
    pub conversation_id: String,
}

#[derive(Deserialize)]
pub struct TitleRequest {
    pub first_message: String,
}

#[derive(Serialize)]
pub struct TitleResponse {
    pub title: String,
}

pub fn parse_conversation_id(raw: &str) -> Result<ConversationId, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("malformed conversation id: {}", raw)))
}

#[tracing::instrument(skip_all, fields(owner = %session.owner))]
pub async fn list_conversations_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let summaries = state.conversations.list(&session.owner).await?;

    Ok(Json(ConversationListResponse {
        conversations: summaries
            .into_iter()
            .map(|s| ConversationListItem {
                id: s.id.to_string(),
                title: s.title,
            })
            .collect(),
    }))
}

#[tracing::instrument(skip_all, fields(owner = %session.owner))]
pub async fn create_conversation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state.conversations.create(&session.owner).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation_id: conversation.id.to_string(),
        }),
    ))
}

#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn history_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation_id = parse_conversation_id(&id)?;
    let messages = state
        .conversations
        .history(conversation_id, &session.owner)
        .await?;

    Ok(Json(HistoryResponse {
        history: messages
            .into_iter()
            .map(|m| HistoryEntry {
                is_user: m.role.is_user(),
                text: m.content,
            })
            .collect(),
        conversation_id: conversation_id.to_string(),
    }))
}

#[tracing::instrument(skip(state, session, request), fields(owner = %session.owner))]
pub async fn title_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<TitleRequest>,
) -> Result<Json<TitleResponse>, ApiError> {
    let conversation_id = parse_conversation_id(&id)?;
    let title = derive_title(&request.first_message);

    state
        .conversations
        .set_title(conversation_id, &session.owner, &title)
        .await?;

    Ok(Json(TitleResponse { title }))
}

#[tracing::instrument(skip(state, session), fields(owner = %session.owner))]
pub async fn stop_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conversation_id = parse_conversation_id(&id)?;
    state
        .chat_service
        .stop(conversation_id, &session.owner)
        .await?;

    Ok(StatusCode::ACCEPTED)
}
