//! HTTP surface: route table shared by the binary and the tests.
use crate::handlers::{self, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Largest accepted request body (PDF uploads).
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Builds the application routes.
///
/// Rate limiting, tracing and CORS are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/health", get(handlers::health))
        // Pages
        .route("/", get(handlers::index))
        .route("/extractor", get(handlers::extractor))
        // Extraction & comparison
        .route("/extract", post(handlers::extract))
        .route("/compare", post(handlers::compare))
        // Contract collection
        .route("/api/contracts", get(handlers::get_contracts))
        .route(
            "/api/contracts/delete/:level_id",
            delete(handlers::delete_contract),
        )
        .route(
            "/api/contracts/:level_id/analysis",
            get(handlers::stored_contract_analysis),
        )
        .route("/api/analyze", post(handlers::analyze_contract))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
