//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::LedgerServices;

pub use routes::create_router;

/// Build the application router
pub fn build_router(services: LedgerServices) -> Router {
    // Layers run last-added first: logging -> actor -> handler
    let protected_routes = create_router()
        .layer(axum_middleware::from_fn(middleware::actor_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(services)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
