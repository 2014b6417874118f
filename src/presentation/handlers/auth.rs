use axum::Json;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use serde::{Deserialize, Serialize};

use crate::domain::Session;
use crate::presentation::error::ApiError;
use crate::presentation::middleware::{SESSION_COOKIE, session_token};
use crate::presentation::state::AppState;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub username: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn session_response(session: Session, cookie_secure: bool) -> impl IntoResponse {
    let max_age = (session.expires_at - session.created_at).num_seconds();
    let cookie = session_cookie(session.token.as_str(), max_age, cookie_secure);

    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(LoginResponse {
            authenticated: true,
            username: session.owner,
            token: session.token.as_str().to_string(),
        }),
    )
}

#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .register(&request.username, &request.password)
        .await?;

    Ok((StatusCode::CREATED, session_response(session, state.cookie_secure)))
}

#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .login(&request.username, &request.password)
        .await?;

    Ok(session_response(session, state.cookie_secure))
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.logout(&token).await;
    }

    (
        AppendHeaders([(SET_COOKIE, session_cookie("", 0, state.cookie_secure))]),
        Json(serde_json::json!({ "success": true })),
    )
}

pub async fn check_auth_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = session_token(&headers);
    match state.sessions.validate(token.as_deref()).await {
        Ok(session) => (
            StatusCode::OK,
            Json(AuthStatusResponse {
                authenticated: true,
                username: Some(session.owner),
            }),
        ),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(AuthStatusResponse {
                authenticated: false,
                username: None,
            }),
        ),
    }
}
