//! Response DTOs for the daemon API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStatReport;
use crate::ratelimit::RateLimitStatus;
use crate::upstream::GeolocStatus;

/// Response body for the address lookup (GET /address)
///
/// `address` holds a placeholder when `status` is not OK.
#[derive(Debug, Clone, Serialize)]
pub struct AddressResponse {
    pub lat: String,
    pub lon: String,
    pub address: String,
    pub status: GeolocStatus,
}

impl AddressResponse {
    pub fn new(
        lat: impl Into<String>,
        lon: impl Into<String>,
        address: impl Into<String>,
        status: GeolocStatus,
    ) -> Self {
        Self {
            lat: lat.into(),
            lon: lon.into(),
            address: address.into(),
            status,
        }
    }
}

/// Response body for the cache statistics (GET /cachestat)
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatResponse {
    pub address: CacheStatReport,
    pub minimap: CacheStatReport,
    pub rate_limits: Vec<RateLimitStatus>,
}

/// Response body for the cache save (POST /cache/save)
#[derive(Debug, Clone, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub addresses: usize,
    pub minimaps: usize,
}

impl SaveResponse {
    pub fn new(addresses: usize, minimaps: usize) -> Self {
        Self {
            message: format!("Saved {} addresses and {} minimaps", addresses, minimaps),
            addresses,
            minimaps,
        }
    }
}

/// Response body for the rate limit reset (POST /ratelimit/reset)
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
}

impl ResetResponse {
    pub fn done() -> Self {
        Self {
            message: "Rate limits reset".to_string(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_response_serialize() {
        let resp = AddressResponse::new("59.5", "17.5", "(?)", GeolocStatus::Blocked24h);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"address\":\"(?)\""));
        assert!(json.contains("\"status\":\"BLOCKED_24H\""));
    }

    #[test]
    fn test_save_response_message() {
        let resp = SaveResponse::new(3, 1);
        assert_eq!(resp.message, "Saved 3 addresses and 1 minimaps");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
