//! Map Provider Module
//!
//! The upstream reverse-geocoding and static-map service behind a trait, with
//! the Google Maps implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::cache::MinimapSpec;
use crate::config::Config;
use crate::error::Result;
use crate::upstream::GeolocStatus;

/// Upper bound on a single upstream request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// First bytes of every PNG file
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// == Replies ==
/// Reply to a reverse-geocoding request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeReply {
    pub status: GeolocStatus,
    pub address: Option<String>,
}

/// Reply to a static-map request.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMapReply {
    pub status: GeolocStatus,
    pub image: Option<Vec<u8>>,
}

// == Provider Trait ==
/// Upstream map service.
///
/// Transport failures are errors; provider-level failures are replies with a
/// non-OK status.
#[async_trait]
pub trait MapsProvider: Send + Sync {
    async fn reverse_geocode(&self, latitude: &str, longitude: &str) -> Result<GeocodeReply>;

    async fn static_map(
        &self,
        latitude: &str,
        longitude: &str,
        spec: MinimapSpec,
    ) -> Result<StaticMapReply>;
}

// == Google Maps ==
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

/// Google Maps Geocoding and Static Maps client.
#[derive(Debug, Clone)]
pub struct GoogleMapsProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl GoogleMapsProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, language: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client: {}, using default", e);
                Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            language: language.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            config.language.clone(),
        )
    }

    /// Query pairs shared by both endpoints.
    fn with_key<'a>(&'a self, mut query: Vec<(&'static str, &'a str)>) -> Vec<(&'static str, &'a str)> {
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }
        query
    }

    /// Reverse-geocoding request; query values are URL-encoded.
    pub fn geocode_request(&self, latitude: &str, longitude: &str) -> reqwest::Result<Request> {
        let latlng = format!("{},{}", latitude, longitude);
        let query = self.with_key(vec![
            ("latlng", latlng.as_str()),
            ("language", self.language.as_str()),
        ]);
        self.client
            .get(format!("{}/maps/api/geocode/json", self.base_url))
            .query(&query)
            .build()
    }

    /// Static-map request with a marker on the position.
    pub fn static_map_request(
        &self,
        latitude: &str,
        longitude: &str,
        spec: MinimapSpec,
    ) -> reqwest::Result<Request> {
        let center = format!("{},{}", latitude, longitude);
        let zoom = spec.zoom.to_string();
        let size = format!("{}x{}", spec.width, spec.height);
        let query = self.with_key(vec![
            ("center", center.as_str()),
            ("zoom", zoom.as_str()),
            ("size", size.as_str()),
            ("maptype", "roadmap"),
            ("markers", center.as_str()),
        ]);
        self.client
            .get(format!("{}/maps/api/staticmap", self.base_url))
            .query(&query)
            .build()
    }
}

/// Extracts status and first formatted address from a geocode JSON body.
pub fn parse_geocode_body(body: &str) -> GeocodeReply {
    match serde_json::from_str::<GeocodeResponse>(body) {
        Ok(response) => {
            let status = GeolocStatus::from_api(&response.status);
            if let Some(message) = &response.error_message {
                warn!("Geocode reply {}: {}", response.status, message);
            }
            let address = response
                .results
                .into_iter()
                .next()
                .map(|result| result.formatted_address);
            GeocodeReply { status, address }
        }
        Err(e) => {
            warn!("Unparsable geocode reply: {}", e);
            GeocodeReply {
                status: GeolocStatus::UnknownError,
                address: None,
            }
        }
    }
}

/// Classifies a static-map HTTP reply.
pub fn classify_static_map(status: StatusCode, body: Vec<u8>) -> StaticMapReply {
    let status = match status {
        StatusCode::OK if body.starts_with(&PNG_SIGNATURE) => GeolocStatus::Ok,
        StatusCode::OK => GeolocStatus::UnknownError,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => GeolocStatus::OverQueryLimit,
        StatusCode::BAD_REQUEST => GeolocStatus::InvalidRequest,
        _ => GeolocStatus::UnknownError,
    };
    let image = (status == GeolocStatus::Ok).then_some(body);
    StaticMapReply { status, image }
}

#[async_trait]
impl MapsProvider for GoogleMapsProvider {
    #[instrument(skip(self), fields(api = "geocode"))]
    async fn reverse_geocode(&self, latitude: &str, longitude: &str) -> Result<GeocodeReply> {
        let request = self.geocode_request(latitude, longitude)?;
        let response = self.client.execute(request).await?;
        let body = response.text().await?;
        let reply = parse_geocode_body(&body);
        debug!("Geocode reply status {}", reply.status);
        Ok(reply)
    }

    #[instrument(skip(self), fields(api = "staticmap"))]
    async fn static_map(
        &self,
        latitude: &str,
        longitude: &str,
        spec: MinimapSpec,
    ) -> Result<StaticMapReply> {
        let request = self.static_map_request(latitude, longitude, spec)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        let reply = classify_static_map(status, body);
        debug!("Static map reply status {} ({})", reply.status, status);
        Ok(reply)
    }
}
