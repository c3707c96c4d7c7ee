//! Mock OpenAI-compatible API.
//!
//! Endpoints:
//! - GET /v1/models - Fixed single-model listing
//! - POST /v1/chat/completions - Log the request, return a synthetic completion

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::logger::DiagnosticLog;

// Re-export commonly used types
pub use handlers::{
    build_chat_response, field_or_placeholder, parse_payload, COMPLETION_ID, MODEL_CREATED,
    MODEL_ID, MODEL_OWNER, NOT_PROVIDED,
};
pub use types::*;

/// Application state shared across handlers.
pub struct AppState {
    pub log: DiagnosticLog,
}

impl AppState {
    pub fn new(log: DiagnosticLog) -> Self {
        Self { log }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DiagnosticLog::new())
    }
}

/// Create the API router with a log that discards records.
pub fn create_router() -> Router {
    create_router_with_state(AppState::default())
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .with_state(Arc::new(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
