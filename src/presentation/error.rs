use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::{ChatError, ConversationError, IngestionError, SessionError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Error surface of every JSON endpoint: `{"error": <code>, "message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ConversationError::Repository(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::NotFound(_) | ChatError::NotGenerating(_) => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::Busy(_) => ApiError::Conflict(err.to_string()),
            ChatError::Store(inner) => inner.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized | SessionError::InvalidCredentials => {
                ApiError::Unauthorized(err.to_string())
            }
            SessionError::MissingCredentials | SessionError::UsernameTaken => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::InvalidPasswordHash(_)
            | SessionError::Hashing(_)
            | SessionError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Splitting(_) => ApiError::BadRequest(err.to_string()),
            IngestionError::NoEmbeddings(_) => ApiError::UnprocessableEntity(err.to_string()),
            IngestionError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}
