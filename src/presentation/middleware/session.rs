use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Session token from the `session` cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.trim().to_string());

    from_cookie.filter(|t| !t.is_empty()).or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
    })
}

/// Rejects the request with 401 before any handler runs unless it carries a
/// live session; otherwise makes the `Session` available as an extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session_token(request.headers());

    match state.sessions.validate(token.as_deref()).await {
        Ok(session) => {
            tracing::debug!(owner = %session.owner, "Session validated");
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Request rejected without valid session");
            ApiError::Unauthorized("a valid session is required".to_string()).into_response()
        }
    }
}
