//! API Module
//!
//! HTTP handlers and routing for the geolocation daemon.
//!
//! # Endpoints
//! - `GET /address` - Reverse geocode a position
//! - `GET /minimap` - Static map image for a position
//! - `GET /cachestat` - Cache statistics
//! - `POST /cache/save` - Persist the caches
//! - `POST /ratelimit/reset` - Clear the upstream lockout
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
