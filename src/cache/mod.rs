//! Cache Module
//!
//! Bounded, disk-persisted caches for reverse-geocoded addresses and
//! rendered static-map images, with exact or proximity lookup.

mod entry;
mod persist;
mod ring;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{
    current_timestamp, minimap_cache_filename, validate_address, AddressEntry, Coordinates,
    MinimapEntry, MinimapSpec,
};
pub use persist::{CachePaths, CacheSnapshot, LoadedCaches};
pub use ring::RingBuffer;
pub use stats::{CacheCounters, CacheStatReport, CacheStats};
pub use store::{CacheKind, CacheSettings, GeolocCache, MatchMode};

// == Public Constants ==
/// Smallest accepted latitude/longitude magnitude in degrees
pub const MIN_COORDINATE: f64 = 1.0;

/// Largest accepted latitude/longitude magnitude in degrees
pub const MAX_COORDINATE: f64 = 89.0;

/// Addresses shorter than this are considered corrupt
pub const MIN_ADDRESS_LENGTH: usize = 5;

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 20;

/// Largest minimap width or height in pixels
pub const MAX_MINIMAP_SIZE: u32 = 600;

/// Shorter minimap file names indicate malformed coordinates
pub const MIN_MINIMAP_FILENAME_LENGTH: usize = 31;

/// Multiplier applied with detailed/overview zoom to the radius at overview zoom
pub const OVERVIEW_RADIUS_FACTOR: f64 = 15.0;
