//! Error types for the geolocation daemon
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::upstream::GeolocStatus;

// == Geoloc Error Enum ==
/// Unified error type for the cache, rate limiter and upstream client.
#[derive(Error, Debug)]
pub enum GeolocError {
    /// Rejected input (coordinates out of band, bad zoom or size, bad address)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A persisted cache file contained a line that failed validation
    #[error("Corrupt cache file {path}, line {line}: {reason}")]
    CorruptCache {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Filesystem failure while loading or saving a cache
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Upstream provider answered with a non-OK status
    #[error("Upstream returned {0}")]
    Upstream(GeolocStatus),

    /// Upstream calls are suspended after repeated quota failures
    #[error("Upstream API blocked for 24h after repeated quota errors")]
    Blocked24h,

    /// Transport failure talking to the upstream provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal consistency failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GeolocError {
    /// Builds an `Io` error carrying the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeolocError::Io {
            path: path.into(),
            source,
        }
    }

    /// Status code reported to collaborators for this failure.
    pub fn status(&self) -> GeolocStatus {
        match self {
            GeolocError::Upstream(status) => *status,
            GeolocError::Blocked24h => GeolocStatus::Blocked24h,
            GeolocError::InvalidRequest(_) => GeolocStatus::InvalidRequest,
            _ => GeolocStatus::UnknownError,
        }
    }

    /// True when the failure is due to exhausted upstream quota.
    pub fn is_quota(&self) -> bool {
        matches!(
            self.status(),
            GeolocStatus::OverQueryLimit | GeolocStatus::Blocked24h
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for GeolocError {
    fn into_response(self) -> Response {
        let status = match &self {
            GeolocError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GeolocError::Upstream(GeolocStatus::OverQueryLimit) | GeolocError::Blocked24h => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GeolocError::Upstream(GeolocStatus::ZeroResults) => StatusCode::NOT_FOUND,
            GeolocError::Upstream(_) | GeolocError::Http(_) => StatusCode::BAD_GATEWAY,
            GeolocError::CorruptCache { .. } | GeolocError::Io { .. } | GeolocError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": self.status().as_str(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the geolocation daemon.
pub type Result<T> = std::result::Result<T, GeolocError>;
