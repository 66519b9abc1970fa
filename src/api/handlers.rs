//! API Handlers
//!
//! HTTP request handlers for each daemon endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::cache::{CacheKind, CacheSettings, Coordinates, GeolocCache, MinimapSpec};
use crate::config::Config;
use crate::error::{GeolocError, Result};
use crate::models::{
    AddressQuery, AddressResponse, CacheStatResponse, HealthResponse, MinimapQuery,
    ResetResponse, SaveResponse,
};
use crate::upstream::{
    GeolocService, GeolocStatus, GoogleMapsProvider, ServiceSettings, ADDRESS_PLACEHOLDER,
    QUOTA_PLACEHOLDER,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside geolocation service
    pub service: GeolocService,
    /// Map size and zoom used when a request leaves them out
    pub default_minimap: MinimapSpec,
}

impl AppState {
    pub fn new(service: GeolocService, default_minimap: MinimapSpec) -> Self {
        Self {
            service,
            default_minimap,
        }
    }

    /// Creates a new AppState from configuration, talking to Google Maps.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = GeolocCache::new(CacheSettings::from_config(config));
        let provider = Arc::new(GoogleMapsProvider::from_config(config));
        let service = GeolocService::new(cache, provider, ServiceSettings::from_config(config));
        let default_minimap = MinimapSpec::new(
            config.detailed_zoom,
            config.minimap_width,
            config.minimap_height,
        )?;
        Ok(Self::new(service, default_minimap))
    }
}

/// Handler for GET /address
///
/// Bad coordinates are rejected; upstream failures still answer 200 with
/// the placeholder the report would store and the failing status.
pub async fn address_handler(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<AddressResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(GeolocError::InvalidRequest(error_msg));
    }
    Coordinates::parse(&query.lat, &query.lon)?;

    let (address, status) = match state
        .service
        .get_address_from_latlon(&query.lat, &query.lon)
        .await
    {
        Ok(address) => (address, GeolocStatus::Ok),
        Err(e) if e.is_quota() => (QUOTA_PLACEHOLDER.to_string(), e.status()),
        Err(e) => (ADDRESS_PLACEHOLDER.to_string(), e.status()),
    };

    Ok(Json(AddressResponse::new(query.lat, query.lon, address, status)))
}

/// Handler for GET /minimap
///
/// Answers with the PNG bytes.
pub async fn minimap_handler(
    State(state): State<AppState>,
    Query(query): Query<MinimapQuery>,
) -> Result<Response> {
    let spec = query.spec(state.default_minimap)?;
    let image = state
        .service
        .get_minimap_from_latlon(&query.lat, &query.lon, spec)
        .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], image).into_response())
}

/// Handler for GET /cachestat
pub async fn cachestat_handler(State(state): State<AppState>) -> Json<CacheStatResponse> {
    let service = &state.service;
    Json(CacheStatResponse {
        address: service.cache_stat(CacheKind::Address).await,
        minimap: service.cache_stat(CacheKind::Minimap).await,
        rate_limits: service.rate_limit_status().await,
    })
}

/// Handler for POST /cache/save
pub async fn save_handler(State(state): State<AppState>) -> Result<Json<SaveResponse>> {
    let (addresses, minimaps) = state.service.save_caches().await?;
    info!("Caches saved on request");
    Ok(Json(SaveResponse::new(addresses, minimaps)))
}

/// Handler for POST /ratelimit/reset
pub async fn reset_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    state.service.reset_rate_limit().await;
    info!("Rate limits reset on request");
    Json(ResetResponse::done())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
