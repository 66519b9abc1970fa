//! API Routes
//!
//! Configures the Axum router with all daemon endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    address_handler, cachestat_handler, health_handler, minimap_handler, reset_handler,
    save_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /address?lat=&lon=` - Street address for a position
/// - `GET /minimap?lat=&lon=[&zoom=&width=&height=]` - Static map PNG
/// - `GET /cachestat` - Cache statistics and rate limiter state
/// - `POST /cache/save` - Persist both caches now
/// - `POST /ratelimit/reset` - Lift the 24h lockout
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/address", get(address_handler))
        .route("/minimap", get(minimap_handler))
        .route("/cachestat", get(cachestat_handler))
        .route("/cache/save", post(save_handler))
        .route("/ratelimit/reset", post(reset_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
