//! Upstream Module
//!
//! Reverse geocoding and static maps from the map provider, fronted by the
//! geolocation cache and the rate limiters.

mod notify;
mod provider;
mod service;
mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use notify::{LogNotifier, Notifier};
pub use provider::{
    classify_static_map, parse_geocode_body, GeocodeReply, GoogleMapsProvider, MapsProvider,
    StaticMapReply, PNG_SIGNATURE,
};
pub use service::{
    GeolocService, ServiceSettings, ADDRESS_PLACEHOLDER, QUOTA_PLACEHOLDER,
};
pub use status::GeolocStatus;
