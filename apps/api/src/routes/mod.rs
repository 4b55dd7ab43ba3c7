pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::conversation::handlers as chat;
use crate::curation::handlers as digest;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interest interview
        .route("/api/v1/chat", post(chat::handle_chat))
        // Digest
        .route("/api/v1/sections", get(digest::handle_list_sections))
        .route("/api/v1/digest", post(digest::handle_create_digest))
        .fallback(not_found)
        .with_state(state)
}
