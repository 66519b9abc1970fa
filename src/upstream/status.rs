//! Upstream status codes
//!
//! Mirrors the statuses of the map provider, plus the local lockout code.

use std::fmt;

use serde::Serialize;

/// Outcome of a geocode or static-map request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeolocStatus {
    Ok,
    OverQueryLimit,
    ZeroResults,
    InvalidRequest,
    RequestDenied,
    UnknownError,
    /// Local: calls suspended for 24h after repeated over-quota replies
    #[serde(rename = "BLOCKED_24H")]
    Blocked24h,
}

impl GeolocStatus {
    /// Maps a provider status string; unknown values become `UnknownError`.
    pub fn from_api(status: &str) -> Self {
        match status {
            "OK" => GeolocStatus::Ok,
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => GeolocStatus::OverQueryLimit,
            "ZERO_RESULTS" => GeolocStatus::ZeroResults,
            "INVALID_REQUEST" => GeolocStatus::InvalidRequest,
            "REQUEST_DENIED" => GeolocStatus::RequestDenied,
            _ => GeolocStatus::UnknownError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeolocStatus::Ok => "OK",
            GeolocStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            GeolocStatus::ZeroResults => "ZERO_RESULTS",
            GeolocStatus::InvalidRequest => "INVALID_REQUEST",
            GeolocStatus::RequestDenied => "REQUEST_DENIED",
            GeolocStatus::UnknownError => "UNKNOWN_ERROR",
            GeolocStatus::Blocked24h => "BLOCKED_24H",
        }
    }
}

impl fmt::Display for GeolocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
