//! Geometry Module
//!
//! Distance helpers used by the proximity matching of the caches.

mod distance;

pub use distance::{distance_km, distance_meters, distance_miles};
