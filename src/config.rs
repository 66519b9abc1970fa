//! Configuration Module
//!
//! Handles loading and managing daemon configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Upstream spacing for anonymous API access
pub const ANONYMOUS_INTERVAL_MS: u64 = 220;

/// Upstream spacing when an API key is configured
pub const KEYED_INTERVAL_MS: u64 = 110;

/// Daemon configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address cache capacity
    pub address_cache_size: usize,
    /// Minimap cache capacity
    pub minimap_cache_size: usize,
    /// Proximity radius in meters, 0 selects exact matching
    pub proximity_radius: f64,
    /// Zoom of the wide-context minimap
    pub overview_zoom: u8,
    /// Zoom of the close-up minimap
    pub detailed_zoom: u8,
    /// Default minimap width in pixels
    pub minimap_width: u32,
    /// Default minimap height in pixels
    pub minimap_height: u32,
    /// Map provider API key
    pub api_key: Option<String>,
    pub geocode_interval_ms: u64,
    pub staticmap_interval_ms: u64,
    /// Consecutive over-quota results before the 24h lockout
    pub failed_calls_before_blocking: u32,
    /// Sleep between inline over-quota retries
    pub quota_retry_delay_ms: u64,
    pub api_base_url: String,
    /// Language of geocoded addresses
    pub language: String,
    /// Directory holding the persisted caches
    pub data_dir: PathBuf,
    /// Rehydrate the caches at startup
    pub load_cache: bool,
    /// Persist the caches at shutdown
    pub save_cache: bool,
    /// Seconds between background saves, 0 disables
    pub autosave_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `GEOLOC_ADDRESS_CACHE_SIZE` - Address cache capacity (default: 5000)
    /// - `GEOLOC_MINIMAP_CACHE_SIZE` - Minimap cache capacity (default: 1000)
    /// - `GEOLOC_PROXIMITY_RADIUS` - Match radius in meters, 0 = exact (default: 20)
    /// - `GEOLOC_OVERVIEW_ZOOM` / `GEOLOC_DETAILED_ZOOM` - (default: 9 / 15)
    /// - `GEOLOC_MINIMAP_WIDTH` / `GEOLOC_MINIMAP_HEIGHT` - (default: 200 / 200)
    /// - `GEOLOC_API_KEY` - Provider API key (default: unset)
    /// - `GEOLOC_GEOCODE_INTERVAL_MS` / `GEOLOC_STATICMAP_INTERVAL_MS` -
    ///   (default: 110 with a key, 220 without)
    /// - `GEOLOC_FAILED_CALLS_BEFORE_BLOCKING` - (default: 2)
    /// - `GEOLOC_QUOTA_RETRY_DELAY_MS` - (default: 1000)
    /// - `GEOLOC_API_BASE_URL` - (default: https://maps.googleapis.com)
    /// - `GEOLOC_LANGUAGE` - (default: en)
    /// - `GEOLOC_DATA_DIR` - (default: ./data)
    /// - `GEOLOC_LOAD_CACHE` / `GEOLOC_SAVE_CACHE` - (default: true / true)
    /// - `GEOLOC_AUTOSAVE_INTERVAL` - Seconds, 0 disables (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env::var("GEOLOC_API_KEY").ok().filter(|key| !key.is_empty());
        let interval = default_interval_ms(api_key.is_some());

        Self {
            address_cache_size: env_or("GEOLOC_ADDRESS_CACHE_SIZE", defaults.address_cache_size),
            minimap_cache_size: env_or("GEOLOC_MINIMAP_CACHE_SIZE", defaults.minimap_cache_size),
            proximity_radius: env_or("GEOLOC_PROXIMITY_RADIUS", defaults.proximity_radius),
            overview_zoom: env_or("GEOLOC_OVERVIEW_ZOOM", defaults.overview_zoom),
            detailed_zoom: env_or("GEOLOC_DETAILED_ZOOM", defaults.detailed_zoom),
            minimap_width: env_or("GEOLOC_MINIMAP_WIDTH", defaults.minimap_width),
            minimap_height: env_or("GEOLOC_MINIMAP_HEIGHT", defaults.minimap_height),
            api_key,
            geocode_interval_ms: env_or("GEOLOC_GEOCODE_INTERVAL_MS", interval),
            staticmap_interval_ms: env_or("GEOLOC_STATICMAP_INTERVAL_MS", interval),
            failed_calls_before_blocking: env_or(
                "GEOLOC_FAILED_CALLS_BEFORE_BLOCKING",
                defaults.failed_calls_before_blocking,
            ),
            quota_retry_delay_ms: env_or("GEOLOC_QUOTA_RETRY_DELAY_MS", defaults.quota_retry_delay_ms),
            api_base_url: env::var("GEOLOC_API_BASE_URL").unwrap_or(defaults.api_base_url),
            language: env::var("GEOLOC_LANGUAGE").unwrap_or(defaults.language),
            data_dir: env::var("GEOLOC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            load_cache: env_flag("GEOLOC_LOAD_CACHE", defaults.load_cache),
            save_cache: env_flag("GEOLOC_SAVE_CACHE", defaults.save_cache),
            autosave_interval: env_or("GEOLOC_AUTOSAVE_INTERVAL", defaults.autosave_interval),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

/// Provider query spacing for anonymous or keyed access.
pub fn default_interval_ms(has_api_key: bool) -> u64 {
    if has_api_key {
        KEYED_INTERVAL_MS
    } else {
        ANONYMOUS_INTERVAL_MS
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address_cache_size: 5000,
            minimap_cache_size: 1000,
            proximity_radius: 20.0,
            overview_zoom: 9,
            detailed_zoom: 15,
            minimap_width: 200,
            minimap_height: 200,
            api_key: None,
            geocode_interval_ms: ANONYMOUS_INTERVAL_MS,
            staticmap_interval_ms: ANONYMOUS_INTERVAL_MS,
            failed_calls_before_blocking: 2,
            quota_retry_delay_ms: 1000,
            api_base_url: "https://maps.googleapis.com".to_string(),
            language: "en".to_string(),
            data_dir: PathBuf::from("./data"),
            load_cache: true,
            save_cache: true,
            autosave_interval: 0,
            server_port: 3100,
        }
    }
}
