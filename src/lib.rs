//! Geoloc Cache - A geolocation cache daemon for GPS trackers
//!
//! Fronts a reverse-geocoding and static-map provider with bounded,
//! persisted caches and a quota-aware rate limiter.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod ratelimit;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{GeolocError, Result};
pub use tasks::spawn_autosave_task;
pub use upstream::GeolocService;
