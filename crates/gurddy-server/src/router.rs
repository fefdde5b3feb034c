use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::handlers;

/// Create the main application router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::server_info))
        .route("/health", get(handlers::health))
        // Buffered JSON or SSE, chosen by Accept / X-Stream.
        .route("/mcp", post(handlers::mcp_request).delete(handlers::mcp_close))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
