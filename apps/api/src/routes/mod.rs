pub mod health;

use axum::{
    http::Uri,
    routing::{delete, get, post},
    Router,
};

use crate::errors::AppError;
use crate::matching::handlers;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching
        .route("/api/v1/match", post(handlers::handle_match))
        .route("/api/v1/match/rank", post(handlers::handle_rank))
        .route("/api/v1/search", post(handlers::handle_search))
        // Normalization map
        .route(
            "/api/v1/normalization",
            get(handlers::handle_get_normalization),
        )
        .route(
            "/api/v1/normalization/variants",
            post(handlers::handle_add_variant),
        )
        .route(
            "/api/v1/normalization/variants/:variant",
            delete(handlers::handle_remove_variant),
        )
        .route(
            "/api/v1/normalization/terms",
            post(handlers::handle_add_term),
        )
        // Scoring config & diagnostics
        .route(
            "/api/v1/config",
            get(handlers::handle_get_config).put(handlers::handle_put_config),
        )
        .route("/api/v1/self-check", get(handlers::handle_self_check))
        .fallback(not_found)
        .with_state(state)
}
