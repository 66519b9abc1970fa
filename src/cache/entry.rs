//! Cache Entry Module
//!
//! Defines the address and minimap records held by the geolocation caches,
//! the coordinate validation they share, and the minimap file naming scheme.

use chrono::Utc;

use crate::cache::{
    MAX_COORDINATE, MAX_MINIMAP_SIZE, MAX_ZOOM, MIN_ADDRESS_LENGTH, MIN_COORDINATE,
    MIN_MINIMAP_FILENAME_LENGTH, MIN_ZOOM,
};
use crate::error::{GeolocError, Result};

/// Number of decimals kept from each coordinate in a minimap file name
const FILENAME_DECIMALS: usize = 6;

// == Coordinates ==
/// A device position in both its textual and parsed form.
///
/// The text is kept verbatim for exact matching and for writing the cache
/// files back; the parsed values feed the distance computations.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Parses and validates a textual latitude/longitude pair.
    ///
    /// Both magnitudes must lie in `[1, 89]` degrees. Positions outside that
    /// band are treated as invalid GPS fixes.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self> {
        let lat = parse_degrees("latitude", latitude)?;
        let lon = parse_degrees("longitude", longitude)?;
        Ok(Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            lat,
            lon,
        })
    }

    /// True when the textual form equals the given strings.
    pub fn matches_text(&self, latitude: &str, longitude: &str) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    fn heap_bytes(&self) -> usize {
        self.latitude.len() + self.longitude.len()
    }
}

/// True for `-?digits[.digits]`, the only form used in cache keys and file names.
fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.map_or(true, all_digits)
}

fn parse_degrees(name: &str, text: &str) -> Result<f64> {
    if !is_plain_decimal(text) {
        return Err(GeolocError::InvalidRequest(format!(
            "Malformed {}: '{}'",
            name, text
        )));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| GeolocError::InvalidRequest(format!("Unparsable {}: '{}'", name, text)))?;
    if !(MIN_COORDINATE..=MAX_COORDINATE).contains(&value.abs()) {
        return Err(GeolocError::InvalidRequest(format!(
            "{} {} outside [{}, {}]",
            name, text, MIN_COORDINATE, MAX_COORDINATE
        )));
    }
    Ok(value)
}

// == Address Entry ==
/// A reverse-geocoded street address for a position.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressEntry {
    pub coords: Coordinates,
    pub address: String,
    /// Creation time (Unix seconds)
    pub timestamp: i64,
}

impl AddressEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(coords: Coordinates, address: String) -> Result<Self> {
        Self::with_timestamp(coords, address, current_timestamp())
    }

    /// Creates an entry with an explicit timestamp (used when reloading).
    pub fn with_timestamp(coords: Coordinates, address: String, timestamp: i64) -> Result<Self> {
        validate_address(&address)?;
        Ok(Self {
            coords,
            address,
            timestamp,
        })
    }

    /// Bytes held on the heap by this entry.
    pub fn heap_bytes(&self) -> usize {
        self.coords.heap_bytes() + self.address.len()
    }
}

/// Rejects addresses too short to be genuine, or that would break the
/// semicolon-delimited cache file.
pub fn validate_address(address: &str) -> Result<()> {
    if address.chars().count() < MIN_ADDRESS_LENGTH {
        return Err(GeolocError::InvalidRequest(format!(
            "Address '{}' shorter than {} characters",
            address, MIN_ADDRESS_LENGTH
        )));
    }
    if address.contains(&[';', '\n', '\r'][..]) {
        return Err(GeolocError::InvalidRequest(
            "Address must not contain ';' or line breaks".to_string(),
        ));
    }
    Ok(())
}

// == Minimap Key ==
/// Identity of a rendered map request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimapSpec {
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
}

impl MinimapSpec {
    /// Validates zoom in `[1, 20]` and both dimensions in `[1, 600]`.
    pub fn new(zoom: u8, width: u32, height: u32) -> Result<Self> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(GeolocError::InvalidRequest(format!(
                "Zoom {} outside [{}, {}]",
                zoom, MIN_ZOOM, MAX_ZOOM
            )));
        }
        if width == 0 || height == 0 || width > MAX_MINIMAP_SIZE || height > MAX_MINIMAP_SIZE {
            return Err(GeolocError::InvalidRequest(format!(
                "Minimap size {}x{} outside 1..={}",
                width, height, MAX_MINIMAP_SIZE
            )));
        }
        Ok(Self {
            zoom,
            width,
            height,
        })
    }
}

// == Minimap Entry ==
/// A rendered static-map image for a position.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimapEntry {
    pub coords: Coordinates,
    pub spec: MinimapSpec,
    /// Cache-relative image file name
    pub filename: String,
    pub image: Vec<u8>,
    /// Creation time (Unix seconds)
    pub timestamp: i64,
}

impl MinimapEntry {
    /// Creates an entry owning `image`, stamped with the current time.
    pub fn new(coords: Coordinates, spec: MinimapSpec, image: Vec<u8>) -> Result<Self> {
        Self::with_timestamp(coords, spec, image, current_timestamp())
    }

    /// Creates an entry with an explicit timestamp (used when reloading).
    pub fn with_timestamp(
        coords: Coordinates,
        spec: MinimapSpec,
        image: Vec<u8>,
        timestamp: i64,
    ) -> Result<Self> {
        let filename = minimap_cache_filename(&coords.latitude, &coords.longitude, spec)?;
        Ok(Self {
            coords,
            spec,
            filename,
            image,
            timestamp,
        })
    }

    pub fn image_size(&self) -> usize {
        self.image.len()
    }

    /// Bytes held on the heap by this entry, image included.
    pub fn heap_bytes(&self) -> usize {
        self.coords.heap_bytes() + self.filename.len() + self.image.len()
    }
}

// == Filename Derivation ==
/// Derives the cache file name of a minimap.
///
/// Each coordinate contributes its integer part followed by at most six
/// decimals, truncated: `59.3665432` becomes `59366543`.
pub fn minimap_cache_filename(latitude: &str, longitude: &str, spec: MinimapSpec) -> Result<String> {
    let name = format!(
        "map_{}_{}_{}_{}x{}.png",
        filename_digits(latitude),
        filename_digits(longitude),
        spec.zoom,
        spec.width,
        spec.height
    );
    if name.len() < MIN_MINIMAP_FILENAME_LENGTH {
        return Err(GeolocError::Internal(format!(
            "Minimap filename '{}' too short, malformed coordinates",
            name
        )));
    }
    Ok(name)
}

fn filename_digits(text: &str) -> String {
    let mut digits = String::with_capacity(text.len());
    let mut decimals: Option<usize> = None;
    for ch in text.chars() {
        match decimals {
            None if ch == '.' => decimals = Some(0),
            None => digits.push(ch),
            Some(n) if n < FILENAME_DECIMALS => {
                digits.push(ch);
                decimals = Some(n + 1);
            }
            Some(_) => break,
        }
    }
    digits
}

// == Helper Functions ==
/// Returns current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_bounds_inclusive() {
        assert!(Coordinates::parse("89.0", "1.0").is_ok());
        assert!(Coordinates::parse("-89.0", "-1.0").is_ok());
    }

    #[test]
    fn test_coordinates_out_of_band() {
        assert!(Coordinates::parse("89.0000001", "17.5").is_err());
        assert!(Coordinates::parse("59.5", "0.9999999").is_err());
        assert!(Coordinates::parse("0.5", "17.5").is_err());
        assert!(Coordinates::parse("95.0", "17.5").is_err());
    }

    #[test]
    fn test_coordinates_unparsable() {
        let result = Coordinates::parse("north", "17.5");
        assert!(matches!(result, Err(GeolocError::InvalidRequest(_))));
    }

    #[test]
    fn test_coordinates_plain_decimal_only() {
        assert!(Coordinates::parse("+59.366543", "17.959445").is_err());
        assert!(Coordinates::parse("5.9e1", "17.959445").is_err());
        assert!(Coordinates::parse("59.", "17.959445").is_err());
        assert!(Coordinates::parse(".5", "17.959445").is_err());
        assert!(Coordinates::parse(" 59.5", "17.959445").is_err());
        assert!(Coordinates::parse("59", "-17.959445").is_ok());
    }

    #[test]
    fn test_matches_text_is_textual() {
        let coords = Coordinates::parse("59.1", "17.5").unwrap();
        assert!(coords.matches_text("59.1", "17.5"));
        assert!(!coords.matches_text("59.10", "17.5"));
    }

    #[test]
    fn test_filename_truncates() {
        let spec = MinimapSpec::new(15, 200, 200).unwrap();
        assert_eq!(
            minimap_cache_filename("59.366543", "17.959445", spec).unwrap(),
            "map_59366543_17959445_15_200x200.png"
        );
        assert_eq!(
            minimap_cache_filename("59.3665439", "17.9594451", spec).unwrap(),
            "map_59366543_17959445_15_200x200.png"
        );
    }

    #[test]
    fn test_filename_too_short_rejected() {
        let spec = MinimapSpec::new(9, 100, 100).unwrap();
        let result = minimap_cache_filename("59.1", "17.9", spec);
        assert!(matches!(result, Err(GeolocError::Internal(_))));
    }

    #[test]
    fn test_minimap_spec_bounds() {
        assert!(MinimapSpec::new(1, 600, 600).is_ok());
        assert!(MinimapSpec::new(20, 1, 1).is_ok());
        assert!(MinimapSpec::new(0, 200, 200).is_err());
        assert!(MinimapSpec::new(21, 200, 200).is_err());
        assert!(MinimapSpec::new(15, 601, 200).is_err());
        assert!(MinimapSpec::new(15, 200, 0).is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(validate_address("Main Street 1").is_ok());
        assert!(validate_address("12345").is_ok());
        assert!(validate_address("1234").is_err());
        assert!(validate_address("Main; Street").is_err());
        assert!(validate_address("Main\nStreet").is_err());
    }

    #[test]
    fn test_minimap_entry_heap_bytes() {
        let coords = Coordinates::parse("59.366543", "17.959445").unwrap();
        let spec = MinimapSpec::new(15, 200, 200).unwrap();
        let entry = MinimapEntry::new(coords, spec, vec![0u8; 1000]).unwrap();
        assert_eq!(entry.image_size(), 1000);
        assert_eq!(entry.heap_bytes(), 9 + 9 + entry.filename.len() + 1000);
    }
}
