use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    chat_handler, check_auth_handler, create_conversation_handler, health_handler,
    history_handler, ingest_documents_handler, list_conversations_handler, login_handler,
    logout_handler, register_handler, stop_handler, title_handler,
};
use crate::presentation::middleware::require_session;
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let protected = Router::new()
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route("/conversations/{id}/history", get(history_handler))
        .route("/conversations/{id}/title", post(title_handler))
        .route("/conversations/{id}/stop", post(stop_handler))
        .route("/chat", post(chat_handler))
        .route("/documents", post(ingest_documents_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/check-auth", get(check_auth_handler))
        .merge(protected)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
