//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the lookup, capacity and statistics guarantees of
//! the geolocation cache.

use proptest::prelude::*;

use crate::cache::{CacheKind, CacheSettings, GeolocCache, MatchMode, MinimapSpec};
use crate::geo::distance_meters;

// == Test Configuration ==
const TEST_CAPACITY: usize = 16;

fn new_cache(capacity: usize, match_mode: MatchMode) -> GeolocCache {
    GeolocCache::new(CacheSettings {
        address_capacity: capacity,
        minimap_capacity: capacity,
        match_mode,
        overview_zoom: 9,
        detailed_zoom: 15,
    })
}

// == Strategies ==
/// Generates in-band coordinate text with six decimals
fn coordinate_strategy() -> impl Strategy<Value = String> {
    (1u32..89, 0u32..1_000_000, any::<bool>()).prop_map(|(degrees, micro, negative)| {
        let sign = if negative { "-" } else { "" };
        format!("{}{}.{:06}", sign, degrees, micro)
    })
}

/// Generates addresses accepted by the cache
fn address_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{4,40}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Update { lat: String, lon: String, address: String },
    Lookup { lat: String, lon: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (coordinate_strategy(), coordinate_strategy(), address_strategy())
            .prop_map(|(lat, lon, address)| CacheOp::Update { lat, lon, address }),
        (coordinate_strategy(), coordinate_strategy())
            .prop_map(|(lat, lon)| CacheOp::Lookup { lat, lon }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Statistics count every lookup and every hit.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut cache = new_cache(TEST_CAPACITY, MatchMode::Exact);
        let mut expected_calls: u64 = 0;
        let mut expected_hits: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Update { lat, lon, address } => {
                    cache.update_address(&lat, &lon, address).unwrap();
                }
                CacheOp::Lookup { lat, lon } => {
                    expected_calls += 1;
                    if cache.lookup_address(&lat, &lon).is_some() {
                        expected_hits += 1;
                    }
                }
            }
        }

        let report = cache.cache_stat(CacheKind::Address);
        prop_assert_eq!(report.total_calls, expected_calls);
        prop_assert_eq!(report.hits, expected_hits);
    }

    // The entry count saturates at capacity.
    #[test]
    fn prop_count_saturates(inserts in 0usize..(TEST_CAPACITY * 3)) {
        let mut cache = new_cache(TEST_CAPACITY, MatchMode::Exact);
        for i in 0..inserts {
            cache
                .update_address(&format!("45.{:06}", i), "10.5", format!("Street {}", i))
                .unwrap();
        }

        let (count, capacity) = cache.cache_count(CacheKind::Address);
        prop_assert_eq!(capacity, TEST_CAPACITY);
        prop_assert_eq!(count, inserts.min(TEST_CAPACITY));
        prop_assert!(cache.cache_stat(CacheKind::Address).fill_rate <= 1.0);
    }

    // Exact mode answers a stored text pair, and a different text never hits.
    #[test]
    fn prop_exact_match_is_textual(
        lat in coordinate_strategy(),
        lon in coordinate_strategy(),
        address in address_strategy(),
    ) {
        let mut cache = new_cache(TEST_CAPACITY, MatchMode::Exact);
        cache.update_address(&lat, &lon, address.clone()).unwrap();

        prop_assert_eq!(cache.lookup_address(&lat, &lon), Some(address));
        let padded = format!("{}0", lat);
        prop_assert_eq!(cache.lookup_address(&padded, &lon), None);
    }

    // Proximity mode hits exactly when the Vincenty distance is within radius.
    #[test]
    fn prop_proximity_matches_radius(
        lat_micro in 0u32..1_000_000,
        lon_micro in 0u32..1_000_000,
        dlat in -900i32..900,
        dlon in -900i32..900,
        radius in 1.0f64..80.0,
    ) {
        let lat0 = format!("59.{:06}", lat_micro);
        let lon0 = format!("17.{:06}", lon_micro);
        let lat1 = format!("{:.6}", 59.0 + (f64::from(lat_micro) + f64::from(dlat)) / 1e6);
        let lon1 = format!("{:.6}", 17.0 + (f64::from(lon_micro) + f64::from(dlon)) / 1e6);

        let mut cache = new_cache(TEST_CAPACITY, MatchMode::Proximity(radius));
        cache.update_address(&lat0, &lon0, "Main Street 1".to_string()).unwrap();

        let distance = distance_meters(
            lat0.parse().unwrap(),
            lon0.parse().unwrap(),
            lat1.parse().unwrap(),
            lon1.parse().unwrap(),
        )
        .unwrap();
        let hit = cache.lookup_address(&lat1, &lon1).is_some();
        prop_assert_eq!(hit, distance <= radius, "distance {} radius {}", distance, radius);
    }

    // Minimap lookups never cross zoom levels.
    #[test]
    fn prop_minimap_zoom_isolated(zoom in 1u8..=20, other in 1u8..=20) {
        prop_assume!(zoom != other);
        let mut cache = new_cache(TEST_CAPACITY, MatchMode::Proximity(50.0));
        let stored = MinimapSpec::new(zoom, 200, 200).unwrap();
        cache.update_minimap("59.366543", "17.959445", stored, vec![zoom]).unwrap();

        let query = MinimapSpec::new(other, 200, 200).unwrap();
        prop_assert!(cache.lookup_minimap("59.366543", "17.959445", query).is_none());
        prop_assert_eq!(cache.lookup_minimap("59.366543", "17.959445", stored), Some(vec![zoom]));
    }
}
