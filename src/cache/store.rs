//! Cache Store Module
//!
//! The geolocation cache manager: an address ring and a minimap ring with
//! exact or proximity lookup and per-kind statistics.

use std::mem::size_of;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{
    AddressEntry, CacheCounters, CacheStatReport, Coordinates, MinimapEntry, MinimapSpec,
    RingBuffer, OVERVIEW_RADIUS_FACTOR,
};
use crate::config::Config;
use crate::error::Result;
use crate::geo::distance_meters;

// == Match Mode ==
/// How a lookup decides that a stored position answers a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    /// Textual equality of the latitude and longitude strings
    Exact,
    /// First stored entry within the radius (meters), in slot order
    Proximity(f64),
}

impl MatchMode {
    /// Proximity for a positive radius, exact otherwise.
    pub fn from_radius(radius_meters: f64) -> Self {
        if radius_meters > 0.0 {
            MatchMode::Proximity(radius_meters)
        } else {
            MatchMode::Exact
        }
    }
}

// == Cache Kind ==
/// Selects one of the two caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Address,
    Minimap,
}

// == Cache Settings ==
/// Construction parameters of a [`GeolocCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub address_capacity: usize,
    pub minimap_capacity: usize,
    pub match_mode: MatchMode,
    pub overview_zoom: u8,
    pub detailed_zoom: u8,
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            address_capacity: config.address_cache_size,
            minimap_capacity: config.minimap_cache_size,
            match_mode: MatchMode::from_radius(config.proximity_radius),
            overview_zoom: config.overview_zoom,
            detailed_zoom: config.detailed_zoom,
        }
    }
}

// == Geoloc Cache ==
/// Address and minimap caches sharing one match strategy.
#[derive(Debug)]
pub struct GeolocCache {
    addresses: RingBuffer<AddressEntry>,
    minimaps: RingBuffer<MinimapEntry>,
    address_counters: CacheCounters,
    minimap_counters: CacheCounters,
    match_mode: MatchMode,
    overview_zoom: u8,
    detailed_zoom: u8,
}

impl GeolocCache {
    // == Constructor ==
    /// Allocates both caches at their fixed capacity.
    pub fn new(settings: CacheSettings) -> Self {
        info!(
            "Geoloc cache allocated: addresses={}, minimaps={}, mode={:?}",
            settings.address_capacity, settings.minimap_capacity, settings.match_mode
        );
        Self {
            addresses: RingBuffer::new(settings.address_capacity),
            minimaps: RingBuffer::new(settings.minimap_capacity),
            address_counters: CacheCounters::new(),
            minimap_counters: CacheCounters::new(),
            match_mode: settings.match_mode,
            overview_zoom: settings.overview_zoom,
            detailed_zoom: settings.detailed_zoom,
        }
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    // == Lookup Address ==
    /// Returns the cached address for a position.
    ///
    /// In proximity mode the first occupied slot within the radius wins,
    /// even when a later slot is closer.
    pub fn lookup_address(&self, latitude: &str, longitude: &str) -> Option<String> {
        let found = match self.match_mode {
            MatchMode::Exact => self
                .addresses
                .iter()
                .find(|(_, entry)| entry.coords.matches_text(latitude, longitude)),
            MatchMode::Proximity(radius) => {
                let query = match Coordinates::parse(latitude, longitude) {
                    Ok(query) => query,
                    Err(e) => {
                        debug!("Address lookup with unusable position: {}", e);
                        self.address_counters.record(false);
                        return None;
                    }
                };
                self.addresses
                    .iter()
                    .find(|(_, entry)| within(&entry.coords, &query, radius))
            }
        };

        self.address_counters.record(found.is_some());
        match found {
            Some((index, entry)) => {
                debug!("Address cache hit at slot {} for {},{}", index, latitude, longitude);
                Some(entry.address.clone())
            }
            None => {
                debug!("Address cache miss for {},{}", latitude, longitude);
                None
            }
        }
    }

    // == Lookup Minimap ==
    /// Returns a copy of the cached image for a position and map request.
    ///
    /// Entries rendered at another zoom or size never match. At the overview
    /// zoom the proximity radius is widened by the overview factor.
    pub fn lookup_minimap(&self, latitude: &str, longitude: &str, spec: MinimapSpec) -> Option<Vec<u8>> {
        let found = match self.minimap_radius(spec.zoom) {
            None => self.minimaps.iter().find(|(_, entry)| {
                entry.spec == spec && entry.coords.matches_text(latitude, longitude)
            }),
            Some(radius) => {
                let query = match Coordinates::parse(latitude, longitude) {
                    Ok(query) => query,
                    Err(e) => {
                        debug!("Minimap lookup with unusable position: {}", e);
                        self.minimap_counters.record(false);
                        return None;
                    }
                };
                self.minimaps
                    .iter()
                    .find(|(_, entry)| entry.spec == spec && within(&entry.coords, &query, radius))
            }
        };

        self.minimap_counters.record(found.is_some());
        match found {
            Some((index, entry)) => {
                debug!("Minimap cache hit at slot {}: {}", index, entry.filename);
                Some(entry.image.clone())
            }
            None => {
                debug!(
                    "Minimap cache miss for {},{} zoom {} {}x{}",
                    latitude, longitude, spec.zoom, spec.width, spec.height
                );
                None
            }
        }
    }

    /// Effective proximity radius for a zoom level, `None` in exact mode.
    pub fn minimap_radius(&self, zoom: u8) -> Option<f64> {
        match self.match_mode {
            MatchMode::Exact => None,
            MatchMode::Proximity(radius) if zoom == self.overview_zoom && self.overview_zoom > 0 => {
                let factor = f64::from(self.detailed_zoom) / f64::from(self.overview_zoom)
                    * OVERVIEW_RADIUS_FACTOR;
                Some(radius * factor)
            }
            MatchMode::Proximity(radius) => Some(radius),
        }
    }

    // == Update Address ==
    /// Stores an address in the next circular slot.
    pub fn update_address(&mut self, latitude: &str, longitude: &str, address: String) -> Result<()> {
        let coords = Coordinates::parse(latitude, longitude)?;
        let entry = AddressEntry::new(coords, address)?;
        self.push_address(entry);
        Ok(())
    }

    pub(crate) fn push_address(&mut self, entry: AddressEntry) {
        let (index, replaced) = self.addresses.push(entry);
        if replaced.is_some() {
            debug!("Address cache slot {} reused", index);
        }
        if self.addresses.next_index() == 0 {
            info!(
                "Address cache wrapped after {} entries",
                self.addresses.capacity()
            );
        }
    }

    // == Update Minimap ==
    /// Stores an image in the next circular slot, taking ownership of it.
    ///
    /// The image previously held by that slot is dropped.
    pub fn update_minimap(
        &mut self,
        latitude: &str,
        longitude: &str,
        spec: MinimapSpec,
        image: Vec<u8>,
    ) -> Result<()> {
        let coords = Coordinates::parse(latitude, longitude)?;
        let entry = MinimapEntry::new(coords, spec, image)?;
        self.push_minimap(entry);
        Ok(())
    }

    pub(crate) fn push_minimap(&mut self, entry: MinimapEntry) {
        let (index, replaced) = self.minimaps.push(entry);
        if let Some(old) = replaced {
            debug!(
                "Minimap cache slot {} reused, released {} bytes of {}",
                index,
                old.image_size(),
                old.filename
            );
        }
        if self.minimaps.next_index() == 0 {
            info!(
                "Minimap cache wrapped after {} entries",
                self.minimaps.capacity()
            );
        }
    }

    // == Statistics ==
    /// Statistics report of one cache kind.
    pub fn cache_stat(&self, kind: CacheKind) -> CacheStatReport {
        let (stats, count, capacity, max_index_used, memory_usage_bytes) = match kind {
            CacheKind::Address => (
                self.address_counters.snapshot(),
                self.addresses.len(),
                self.addresses.capacity(),
                self.addresses.max_index_used(),
                size_of::<Option<AddressEntry>>() * self.addresses.capacity()
                    + self
                        .addresses
                        .iter()
                        .map(|(_, entry)| entry.heap_bytes())
                        .sum::<usize>(),
            ),
            CacheKind::Minimap => (
                self.minimap_counters.snapshot(),
                self.minimaps.len(),
                self.minimaps.capacity(),
                self.minimaps.max_index_used(),
                size_of::<Option<MinimapEntry>>() * self.minimaps.capacity()
                    + self
                        .minimaps
                        .iter()
                        .map(|(_, entry)| entry.heap_bytes())
                        .sum::<usize>(),
            ),
        };

        CacheStatReport {
            total_calls: stats.total_calls,
            hits: stats.hits,
            hit_rate: stats.hit_rate(),
            fill_rate: max_index_used as f64 / capacity as f64,
            memory_usage_bytes,
            count,
            capacity,
        }
    }

    /// Current entry count and capacity of one cache kind.
    pub fn cache_count(&self, kind: CacheKind) -> (usize, usize) {
        match kind {
            CacheKind::Address => (self.addresses.len(), self.addresses.capacity()),
            CacheKind::Minimap => (self.minimaps.len(), self.minimaps.capacity()),
        }
    }

    pub(crate) fn counters(&self, kind: CacheKind) -> &CacheCounters {
        match kind {
            CacheKind::Address => &self.address_counters,
            CacheKind::Minimap => &self.minimap_counters,
        }
    }

    // == Persistence Access ==
    pub(crate) fn address_entries(&self) -> impl Iterator<Item = &AddressEntry> {
        self.addresses.iter().map(|(_, entry)| entry)
    }

    pub(crate) fn minimap_entries(&self) -> impl Iterator<Item = &MinimapEntry> {
        self.minimaps.iter().map(|(_, entry)| entry)
    }

    pub(crate) fn address_capacity(&self) -> usize {
        self.addresses.capacity()
    }

    pub(crate) fn minimap_capacity(&self) -> usize {
        self.minimaps.capacity()
    }

    /// Empties the address cache and rewinds its index.
    pub fn clear_addresses(&mut self) {
        self.addresses.clear();
    }

    /// Empties the minimap cache, releasing every image.
    pub fn clear_minimaps(&mut self) {
        self.minimaps.clear();
    }
}

fn within(stored: &Coordinates, query: &Coordinates, radius: f64) -> bool {
    distance_meters(stored.lat, stored.lon, query.lat, query.lon)
        .is_some_and(|meters| meters <= radius)
}
