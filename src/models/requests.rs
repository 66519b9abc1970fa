//! Request DTOs for the daemon API
//!
//! Defines the query strings of incoming HTTP requests.

use serde::Deserialize;

use crate::cache::MinimapSpec;
use crate::error::Result;

/// Query of the address lookup (GET /address)
#[derive(Debug, Clone, Deserialize)]
pub struct AddressQuery {
    /// Latitude as sent by the device
    pub lat: String,
    /// Longitude as sent by the device
    pub lon: String,
}

impl AddressQuery {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.lat.is_empty() || self.lon.is_empty() {
            return Some("Both lat and lon are required".to_string());
        }
        None
    }
}

/// Query of the minimap lookup (GET /minimap)
///
/// Zoom and size fall back to the configured detailed minimap.
#[derive(Debug, Clone, Deserialize)]
pub struct MinimapQuery {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub zoom: Option<u8>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl MinimapQuery {
    /// Resolves the map request against the defaults and validates it.
    pub fn spec(&self, default: MinimapSpec) -> Result<MinimapSpec> {
        MinimapSpec::new(
            self.zoom.unwrap_or(default.zoom),
            self.width.unwrap_or(default.width),
            self.height.unwrap_or(default.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_query_deserialize() {
        let json = r#"{"lat": "59.366543", "lon": "17.959445"}"#;
        let query: AddressQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.lat, "59.366543");
        assert!(query.validate().is_none());
    }

    #[test]
    fn test_validate_empty_coordinate() {
        let query = AddressQuery {
            lat: "".to_string(),
            lon: "17.959445".to_string(),
        };
        assert!(query.validate().is_some());
    }

    #[test]
    fn test_minimap_query_defaults() {
        let json = r#"{"lat": "59.366543", "lon": "17.959445", "zoom": 9}"#;
        let query: MinimapQuery = serde_json::from_str(json).unwrap();
        let spec = query.spec(MinimapSpec::new(15, 200, 150).unwrap()).unwrap();
        assert_eq!(spec, MinimapSpec::new(9, 200, 150).unwrap());
    }

    #[test]
    fn test_minimap_query_out_of_range() {
        let query = MinimapQuery {
            lat: "59.366543".to_string(),
            lon: "17.959445".to_string(),
            zoom: Some(21),
            width: None,
            height: None,
        };
        assert!(query.spec(MinimapSpec::new(15, 200, 200).unwrap()).is_err());
    }
}
