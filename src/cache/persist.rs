//! Cache Persistence Module
//!
//! Reads and writes the semicolon-delimited cache files:
//!
//! - address cache: `timestamp;lat;lon;address`
//! - minimap cache: `timestamp;lat;lon;zoom;width;height;filename`, with the
//!   images stored as `filename` inside the minimap directory
//! - stats: `totalCalls;hits`, address line first, minimap line second
//!
//! A missing file means an empty cache. A single bad line rejects the whole
//! file and leaves the affected cache empty.
//!
//! Disk work is split from the cache: [`CacheSnapshot`] is copied under the
//! lock and written without it, [`LoadedCaches`] is read without the lock
//! and applied under it.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::cache::{
    AddressEntry, CacheKind, CacheStats, Coordinates, GeolocCache, MinimapEntry, MinimapSpec,
};
use crate::error::{GeolocError, Result};

// == File Names ==
pub const ADDRESS_CACHE_FILE: &str = "geoloc_address_cache.txt";
pub const MINIMAP_CACHE_FILE: &str = "geoloc_minimap_cache.txt";
pub const MINIMAP_CACHE_DIR: &str = "geoloc_minimap_cache";
pub const CACHE_STATS_FILE: &str = "geoloc_cache_stats.txt";

// == Cache Paths ==
/// Locations of the persisted cache files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub address_file: PathBuf,
    pub minimap_file: PathBuf,
    pub minimap_dir: PathBuf,
    pub stats_file: PathBuf,
}

impl CachePaths {
    /// Standard layout under a data directory.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            address_file: data_dir.join(ADDRESS_CACHE_FILE),
            minimap_file: data_dir.join(MINIMAP_CACHE_FILE),
            minimap_dir: data_dir.join(MINIMAP_CACHE_DIR),
            stats_file: data_dir.join(CACHE_STATS_FILE),
        }
    }

    /// Previous generation of the address cache.
    pub fn address_backup(&self) -> PathBuf {
        with_suffix(&self.address_file, ".bak")
    }

    /// Generation before the previous one.
    pub fn address_backup_old(&self) -> PathBuf {
        with_suffix(&self.address_file, ".bak2")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Reads a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            Err(GeolocError::io(path, e))
        }
    }
}

fn corrupt(path: &Path, line: usize, reason: impl Into<String>) -> GeolocError {
    GeolocError::CorruptCache {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str) -> std::result::Result<T, String> {
    field
        .parse()
        .map_err(|_| format!("bad {} '{}'", name, field))
}

// == Line Codecs ==
fn parse_address_line(line: &str) -> std::result::Result<AddressEntry, String> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }
    let timestamp = parse_field(fields[0], "timestamp")?;
    let coords = Coordinates::parse(fields[1], fields[2]).map_err(|e| e.to_string())?;
    AddressEntry::with_timestamp(coords, fields[3].to_string(), timestamp).map_err(|e| e.to_string())
}

fn format_address_line(out: &mut String, entry: &AddressEntry) {
    let _ = writeln!(
        out,
        "{};{};{};{}",
        entry.timestamp, entry.coords.latitude, entry.coords.longitude, entry.address
    );
}

/// Parsed minimap record, image not yet loaded.
struct MinimapRecord {
    timestamp: i64,
    coords: Coordinates,
    spec: MinimapSpec,
    filename: String,
}

fn parse_minimap_line(line: &str) -> std::result::Result<MinimapRecord, String> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() != 7 {
        return Err(format!("expected 7 fields, found {}", fields.len()));
    }
    let timestamp = parse_field(fields[0], "timestamp")?;
    let coords = Coordinates::parse(fields[1], fields[2]).map_err(|e| e.to_string())?;
    let spec = MinimapSpec::new(
        parse_field(fields[3], "zoom")?,
        parse_field(fields[4], "width")?,
        parse_field(fields[5], "height")?,
    )
    .map_err(|e| e.to_string())?;
    let filename = fields[6].to_string();
    let expected = crate::cache::minimap_cache_filename(&coords.latitude, &coords.longitude, spec)
        .map_err(|e| e.to_string())?;
    if filename != expected {
        return Err(format!("filename '{}' does not match '{}'", filename, expected));
    }
    Ok(MinimapRecord {
        timestamp,
        coords,
        spec,
        filename,
    })
}

fn format_minimap_line(out: &mut String, entry: &MinimapEntry) {
    let _ = writeln!(
        out,
        "{};{};{};{};{};{};{}",
        entry.timestamp,
        entry.coords.latitude,
        entry.coords.longitude,
        entry.spec.zoom,
        entry.spec.width,
        entry.spec.height,
        entry.filename
    );
}

/// True for names of images this cache writes.
fn is_minimap_image(name: &str) -> bool {
    name.starts_with("map_") && name.ends_with(".png")
}

// == Address File ==
/// Parses the address file, keeping at most `capacity` entries.
fn read_address_file(path: &Path, capacity: usize) -> Result<Vec<AddressEntry>> {
    let Some(content) = read_optional(path)? else {
        info!("No address cache at {}, starting empty", path.display());
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        match parse_address_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                error!(
                    "Rejecting address cache {} at line {}: {}",
                    path.display(),
                    index + 1,
                    reason
                );
                return Err(corrupt(path, index + 1, reason));
            }
        }
    }

    if entries.len() > capacity {
        warn!(
            "Address cache file holds {} entries, keeping the first {}",
            entries.len(),
            capacity
        );
        entries.truncate(capacity);
    }
    Ok(entries)
}

/// Writes the address file after rotating `.bak` to `.bak2` and the
/// current file to `.bak`.
fn write_address_file<'a>(
    paths: &CachePaths,
    entries: impl IntoIterator<Item = &'a AddressEntry>,
) -> Result<usize> {
    let path = &paths.address_file;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GeolocError::io(parent, e))?;
    }

    if path.exists() {
        let backup = paths.address_backup();
        if backup.exists() {
            let old = paths.address_backup_old();
            fs::rename(&backup, &old).map_err(|e| GeolocError::io(&old, e))?;
        }
        fs::rename(path, &backup).map_err(|e| GeolocError::io(&backup, e))?;
    }

    let mut out = String::new();
    let mut written = 0;
    for entry in entries {
        format_address_line(&mut out, entry);
        written += 1;
    }
    fs::write(path, out).map_err(|e| {
        error!("Failed to write address cache {}: {}", path.display(), e);
        GeolocError::io(path, e)
    })?;
    info!("Wrote {} address cache entries to {}", written, path.display());
    Ok(written)
}

// == Minimap Files ==
/// Parses the minimap file and loads each image from `dir`, keeping at most
/// `capacity` entries.
///
/// Records whose image file is missing or empty are skipped.
fn read_minimap_file(path: &Path, dir: &Path, capacity: usize) -> Result<Vec<MinimapEntry>> {
    let Some(content) = read_optional(path)? else {
        info!("No minimap cache at {}, starting empty", path.display());
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        match parse_minimap_line(line) {
            Ok(record) => records.push(record),
            Err(reason) => {
                error!(
                    "Rejecting minimap cache {} at line {}: {}",
                    path.display(),
                    index + 1,
                    reason
                );
                return Err(corrupt(path, index + 1, reason));
            }
        }
    }

    let mut entries = Vec::new();
    for record in records {
        if entries.len() == capacity {
            warn!("Minimap cache file exceeds capacity {}, rest ignored", capacity);
            break;
        }
        let image_path = dir.join(&record.filename);
        let image = match fs::read(&image_path) {
            Ok(image) if !image.is_empty() => image,
            Ok(_) => {
                warn!("Skipping empty minimap image {}", image_path.display());
                continue;
            }
            Err(e) => {
                warn!("Skipping minimap {}: {}", image_path.display(), e);
                continue;
            }
        };
        entries.push(MinimapEntry::with_timestamp(
            record.coords,
            record.spec,
            image,
            record.timestamp,
        )?);
    }
    Ok(entries)
}

/// Writes the minimap records to `path` and their images into `dir`.
///
/// An image already on disk with the same size is not rewritten. Images no
/// record refers to any more are deleted.
fn write_minimap_files<'a>(
    path: &Path,
    dir: &Path,
    entries: impl IntoIterator<Item = &'a MinimapEntry>,
) -> Result<usize> {
    fs::create_dir_all(dir).map_err(|e| GeolocError::io(dir, e))?;

    let mut out = String::new();
    let mut live = HashSet::new();
    let mut written = 0;
    let mut unchanged = 0;
    for entry in entries {
        let image_path = dir.join(&entry.filename);
        let on_disk = fs::metadata(&image_path)
            .map(|meta| meta.len() == entry.image.len() as u64)
            .unwrap_or(false);
        if on_disk {
            unchanged += 1;
        } else {
            fs::write(&image_path, &entry.image).map_err(|e| {
                error!("Failed to write minimap {}: {}", image_path.display(), e);
                GeolocError::io(&image_path, e)
            })?;
        }
        format_minimap_line(&mut out, entry);
        live.insert(entry.filename.as_str());
        written += 1;
    }
    fs::write(path, out).map_err(|e| {
        error!("Failed to write minimap cache {}: {}", path.display(), e);
        GeolocError::io(path, e)
    })?;

    let removed = remove_orphan_images(dir, &live)?;
    info!(
        "Wrote {} minimap cache entries to {} ({} images unchanged, {} removed)",
        written,
        path.display(),
        unchanged,
        removed
    );
    Ok(written)
}

/// Deletes cache images in `dir` that are not in `live`.
fn remove_orphan_images(dir: &Path, live: &HashSet<&str>) -> Result<usize> {
    let mut removed = 0;
    for item in fs::read_dir(dir).map_err(|e| GeolocError::io(dir, e))? {
        let item = item.map_err(|e| GeolocError::io(dir, e))?;
        let name = item.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_minimap_image(name) || live.contains(name) {
            continue;
        }
        match fs::remove_file(item.path()) {
            Ok(()) => {
                debug!("Removed evicted minimap {}", name);
                removed += 1;
            }
            Err(e) => warn!("Failed to remove evicted minimap {}: {}", name, e),
        }
    }
    Ok(removed)
}

// == Stats File ==
fn read_stats_file(path: &Path) -> Result<Option<(CacheStats, CacheStats)>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };

    let mut totals = Vec::with_capacity(2);
    for (index, line) in content.lines().filter(|l| !l.is_empty()).enumerate() {
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() != 2 {
            return Err(corrupt(path, index + 1, "expected totalCalls;hits"));
        }
        let total_calls = parse_field(fields[0], "totalCalls").map_err(|r| corrupt(path, index + 1, r))?;
        let hits = parse_field(fields[1], "hits").map_err(|r| corrupt(path, index + 1, r))?;
        totals.push(CacheStats { total_calls, hits });
    }
    match totals[..] {
        [address, minimap] => Ok(Some((address, minimap))),
        _ => Err(corrupt(path, totals.len(), "expected two lines")),
    }
}

fn write_stats_file(path: &Path, address: CacheStats, minimap: CacheStats) -> Result<()> {
    let out = format!(
        "{};{}\n{};{}\n",
        address.total_calls, address.hits, minimap.total_calls, minimap.hits
    );
    fs::write(path, out).map_err(|e| GeolocError::io(path, e))
}

// == Snapshot ==
/// Copy of everything that gets persisted.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub addresses: Vec<AddressEntry>,
    pub minimaps: Vec<MinimapEntry>,
    pub address_stats: CacheStats,
    pub minimap_stats: CacheStats,
}

impl CacheSnapshot {
    /// Writes all cache files. Returns the address and minimap counts.
    pub fn write_to(&self, paths: &CachePaths) -> Result<(usize, usize)> {
        let addresses = write_address_file(paths, &self.addresses)?;
        let minimaps = write_minimap_files(&paths.minimap_file, &paths.minimap_dir, &self.minimaps)?;
        write_stats_file(&paths.stats_file, self.address_stats, self.minimap_stats)?;
        Ok((addresses, minimaps))
    }
}

// == Loaded Files ==
/// Outcome of reading every cache file, ready to apply to a cache.
#[derive(Debug)]
pub struct LoadedCaches {
    addresses: Result<Vec<AddressEntry>>,
    minimaps: Result<Vec<MinimapEntry>>,
    stats: Result<Option<(CacheStats, CacheStats)>>,
}

impl LoadedCaches {
    /// Reads every file; each one fails on its own.
    pub fn read_from(paths: &CachePaths, address_capacity: usize, minimap_capacity: usize) -> Self {
        Self {
            addresses: read_address_file(&paths.address_file, address_capacity),
            minimaps: read_minimap_file(&paths.minimap_file, &paths.minimap_dir, minimap_capacity),
            stats: read_stats_file(&paths.stats_file),
        }
    }
}

impl GeolocCache {
    /// Copies entries and counters for a save outside the lock.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            addresses: self.address_entries().cloned().collect(),
            minimaps: self.minimap_entries().cloned().collect(),
            address_stats: self.counters(CacheKind::Address).snapshot(),
            minimap_stats: self.counters(CacheKind::Minimap).snapshot(),
        }
    }

    // == Address Cache ==
    /// Replaces the address cache with the content of `path`.
    ///
    /// Returns the number of entries loaded.
    pub fn read_address_cache(&mut self, path: &Path) -> Result<usize> {
        let entries = read_address_file(path, self.address_capacity());
        self.replace_addresses(entries)
    }

    fn replace_addresses(&mut self, entries: Result<Vec<AddressEntry>>) -> Result<usize> {
        self.clear_addresses();
        let entries = entries?;
        let loaded = entries.len();
        for entry in entries {
            self.push_address(entry);
        }
        info!("Loaded {} address cache entries", loaded);
        Ok(loaded)
    }

    /// Writes the address cache to `paths.address_file`.
    ///
    /// The existing file becomes `.bak` and the existing `.bak` becomes
    /// `.bak2` before the new file is written.
    pub fn write_address_cache(&self, paths: &CachePaths) -> Result<usize> {
        write_address_file(paths, self.address_entries())
    }

    // == Minimap Cache ==
    /// Replaces the minimap cache with the records of `path`, loading each
    /// image from `dir`.
    pub fn read_minimap_cache(&mut self, path: &Path, dir: &Path) -> Result<usize> {
        let entries = read_minimap_file(path, dir, self.minimap_capacity());
        self.replace_minimaps(entries)
    }

    fn replace_minimaps(&mut self, entries: Result<Vec<MinimapEntry>>) -> Result<usize> {
        self.clear_minimaps();
        let entries = entries?;
        let loaded = entries.len();
        for entry in entries {
            self.push_minimap(entry);
        }
        info!("Loaded {} minimap cache entries", loaded);
        Ok(loaded)
    }

    /// Writes the minimap records to `path` and every image into `dir`.
    pub fn write_minimap_cache(&self, path: &Path, dir: &Path) -> Result<usize> {
        write_minimap_files(path, dir, self.minimap_entries())
    }

    // == Statistics ==
    /// Restores the call/hit counters from `path`.
    ///
    /// Returns false when there is no stats file.
    pub fn read_cache_stats(&mut self, path: &Path) -> Result<bool> {
        let stats = read_stats_file(path);
        self.restore_stats(stats)
    }

    fn restore_stats(&mut self, stats: Result<Option<(CacheStats, CacheStats)>>) -> Result<bool> {
        let Some((address, minimap)) = stats? else {
            return Ok(false);
        };
        self.counters(CacheKind::Address)
            .restore(address.total_calls, address.hits);
        self.counters(CacheKind::Minimap)
            .restore(minimap.total_calls, minimap.hits);
        Ok(true)
    }

    pub fn write_cache_stats(&self, path: &Path) -> Result<()> {
        write_stats_file(
            path,
            self.counters(CacheKind::Address).snapshot(),
            self.counters(CacheKind::Minimap).snapshot(),
        )
    }

    // == All Files ==
    /// Applies files read by [`LoadedCaches::read_from`].
    ///
    /// A failed file leaves its cache empty; the first failure is returned.
    pub fn apply_loaded(&mut self, loaded: LoadedCaches) -> Result<(usize, usize)> {
        let addresses = self.replace_addresses(loaded.addresses);
        let minimaps = self.replace_minimaps(loaded.minimaps);
        let stats = self.restore_stats(loaded.stats);
        let addresses = addresses?;
        let minimaps = minimaps?;
        stats?;
        Ok((addresses, minimaps))
    }

    /// Rehydrates both caches and the counters.
    pub fn load_from(&mut self, paths: &CachePaths) -> Result<(usize, usize)> {
        let loaded = LoadedCaches::read_from(paths, self.address_capacity(), self.minimap_capacity());
        self.apply_loaded(loaded)
    }

    /// Persists both caches and the counters.
    pub fn save_to(&self, paths: &CachePaths) -> Result<(usize, usize)> {
        let addresses = self.write_address_cache(paths)?;
        let minimaps = self.write_minimap_cache(&paths.minimap_file, &paths.minimap_dir)?;
        self.write_cache_stats(&paths.stats_file)?;
        Ok((addresses, minimaps))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, MatchMode};
    use tempfile::TempDir;

    fn new_cache(capacity: usize) -> GeolocCache {
        GeolocCache::new(CacheSettings {
            address_capacity: capacity,
            minimap_capacity: capacity,
            match_mode: MatchMode::Exact,
            overview_zoom: 9,
            detailed_zoom: 15,
        })
    }

    fn spec() -> MinimapSpec {
        MinimapSpec::new(15, 200, 200).unwrap()
    }

    #[test]
    fn test_missing_files_mean_empty_cache() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);

        assert_eq!(cache.read_address_cache(&paths.address_file).unwrap(), 0);
        assert_eq!(
            cache
                .read_minimap_cache(&paths.minimap_file, &paths.minimap_dir)
                .unwrap(),
            0
        );
        assert!(!cache.read_cache_stats(&paths.stats_file).unwrap());
    }

    #[test]
    fn test_address_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache
            .update_address("59.366543", "17.959445", "Main Street 1".to_string())
            .unwrap();
        cache
            .update_address("-33.868820", "151.209290", "George Street 2".to_string())
            .unwrap();
        let before: Vec<AddressEntry> = cache.address_entries().cloned().collect();

        assert_eq!(cache.write_address_cache(&paths).unwrap(), 2);
        cache.clear_addresses();
        assert_eq!(cache.read_address_cache(&paths.address_file).unwrap(), 2);

        let after: Vec<AddressEntry> = cache.address_entries().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_address_file_format() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache.push_address(
            AddressEntry::with_timestamp(
                Coordinates::parse("59.366543", "17.959445").unwrap(),
                "Main Street 1".to_string(),
                1_700_000_000,
            )
            .unwrap(),
        );
        cache.write_address_cache(&paths).unwrap();

        let content = fs::read_to_string(&paths.address_file).unwrap();
        assert_eq!(content, "1700000000;59.366543;17.959445;Main Street 1\n");
    }

    #[test]
    fn test_corrupt_address_file_aborts_load() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(
            &paths.address_file,
            "1700000000;59.366543;17.959445;Main Street 1\n\
             1700000001;95.0;17.959445;Bad Street 2\n\
             1700000002;58.366543;16.959445;Other Street 3\n",
        )
        .unwrap();

        let mut cache = new_cache(10);
        cache
            .update_address("57.5", "12.5", "Existing Street".to_string())
            .unwrap();
        let result = cache.read_address_cache(&paths.address_file);

        assert!(matches!(result, Err(GeolocError::CorruptCache { line: 2, .. })));
        assert_eq!(cache.cache_count(CacheKind::Address).0, 0);
        assert_eq!(cache.cache_stat(CacheKind::Address).fill_rate, 0.0);
    }

    #[test]
    fn test_short_address_line_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(&paths.address_file, "1700000000;59.366543;17.959445;abc\n").unwrap();

        let mut cache = new_cache(10);
        assert!(cache.read_address_cache(&paths.address_file).is_err());
    }

    #[test]
    fn test_wrong_field_count_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(&paths.address_file, "1700000000;59.366543;Main Street 1\n").unwrap();

        let mut cache = new_cache(10);
        assert!(cache.read_address_cache(&paths.address_file).is_err());
    }

    #[test]
    fn test_address_backup_rotation() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);

        cache
            .update_address("59.5", "17.5", "First Street".to_string())
            .unwrap();
        cache.write_address_cache(&paths).unwrap();
        cache
            .update_address("58.5", "16.5", "Second Street".to_string())
            .unwrap();
        cache.write_address_cache(&paths).unwrap();
        cache
            .update_address("57.5", "15.5", "Third Street".to_string())
            .unwrap();
        cache.write_address_cache(&paths).unwrap();

        let lines = |p: PathBuf| fs::read_to_string(p).unwrap().lines().count();
        assert_eq!(lines(paths.address_file.clone()), 3);
        assert_eq!(lines(paths.address_backup()), 2);
        assert_eq!(lines(paths.address_backup_old()), 1);
    }

    #[test]
    fn test_minimap_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache
            .update_minimap("59.366543", "17.959445", spec(), vec![0x89, b'P', b'N', b'G'])
            .unwrap();

        assert_eq!(
            cache
                .write_minimap_cache(&paths.minimap_file, &paths.minimap_dir)
                .unwrap(),
            1
        );
        assert!(paths
            .minimap_dir
            .join("map_59366543_17959445_15_200x200.png")
            .exists());

        cache.clear_minimaps();
        assert_eq!(
            cache
                .read_minimap_cache(&paths.minimap_file, &paths.minimap_dir)
                .unwrap(),
            1
        );
        assert_eq!(
            cache.lookup_minimap("59.366543", "17.959445", spec()),
            Some(vec![0x89, b'P', b'N', b'G'])
        );
    }

    #[test]
    fn test_minimap_missing_image_skipped() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(
            &paths.minimap_file,
            "1700000000;59.366543;17.959445;15;200;200;map_59366543_17959445_15_200x200.png\n",
        )
        .unwrap();

        let mut cache = new_cache(10);
        assert_eq!(
            cache
                .read_minimap_cache(&paths.minimap_file, &paths.minimap_dir)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_minimap_bad_zoom_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(
            &paths.minimap_file,
            "1700000000;59.366543;17.959445;25;200;200;map_59366543_17959445_25_200x200.png\n",
        )
        .unwrap();

        let mut cache = new_cache(10);
        assert!(cache
            .read_minimap_cache(&paths.minimap_file, &paths.minimap_dir)
            .is_err());
    }

    #[test]
    fn test_stats_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache
            .update_address("59.5", "17.5", "Main Street 1".to_string())
            .unwrap();
        cache.lookup_address("59.5", "17.5");
        cache.lookup_address("59.6", "17.5");
        cache.lookup_minimap("59.5", "17.5", spec());
        cache.write_cache_stats(&paths.stats_file).unwrap();
        assert_eq!(fs::read_to_string(&paths.stats_file).unwrap(), "2;1\n1;0\n");

        let mut fresh = new_cache(10);
        assert!(fresh.read_cache_stats(&paths.stats_file).unwrap());
        assert_eq!(fresh.cache_stat(CacheKind::Address).total_calls, 2);
        assert_eq!(fresh.cache_stat(CacheKind::Address).hits, 1);
        assert_eq!(fresh.cache_stat(CacheKind::Minimap).total_calls, 1);
    }

    #[test]
    fn test_save_and_load_all() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache
            .update_address("59.5", "17.5", "Main Street 1".to_string())
            .unwrap();
        cache
            .update_minimap("59.366543", "17.959445", spec(), vec![1, 2, 3])
            .unwrap();
        assert_eq!(cache.save_to(&paths).unwrap(), (1, 1));

        let mut fresh = new_cache(10);
        assert_eq!(fresh.load_from(&paths).unwrap(), (1, 1));
    }

    fn png_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|item| is_minimap_image(item.as_ref().unwrap().file_name().to_str().unwrap()))
            .count()
    }

    #[test]
    fn test_evicted_minimap_images_removed() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(1);

        for i in 0..5 {
            cache
                .update_minimap(&format!("59.{}66543", i), "17.959445", spec(), vec![1, 2, i])
                .unwrap();
            cache.save_to(&paths).unwrap();
        }

        assert_eq!(cache.cache_count(CacheKind::Minimap).0, 1);
        assert_eq!(png_count(&paths.minimap_dir), 1);
        assert!(paths
            .minimap_dir
            .join("map_59466543_17959445_15_200x200.png")
            .exists());
    }

    #[test]
    fn test_unrelated_files_in_minimap_dir_kept() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::create_dir_all(&paths.minimap_dir).unwrap();
        fs::write(paths.minimap_dir.join("README.txt"), "keep").unwrap();

        let cache = new_cache(4);
        cache.save_to(&paths).unwrap();

        assert!(paths.minimap_dir.join("README.txt").exists());
    }

    #[test]
    fn test_image_on_disk_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(4);
        cache
            .update_minimap("59.366543", "17.959445", spec(), vec![1, 2, 3])
            .unwrap();
        cache.save_to(&paths).unwrap();

        let image_path = paths.minimap_dir.join("map_59366543_17959445_15_200x200.png");
        fs::write(&image_path, [7, 7, 7]).unwrap();
        cache.save_to(&paths).unwrap();

        assert_eq!(fs::read(&image_path).unwrap(), vec![7, 7, 7]);
    }

    #[test]
    fn test_snapshot_written_without_cache() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        let mut cache = new_cache(10);
        cache
            .update_address("59.5", "17.5", "Main Street 1".to_string())
            .unwrap();
        cache
            .update_minimap("59.366543", "17.959445", spec(), vec![1, 2, 3])
            .unwrap();
        cache.lookup_address("59.5", "17.5");

        let snapshot = cache.snapshot();
        cache
            .update_address("58.5", "16.5", "Later Street".to_string())
            .unwrap();
        assert_eq!(snapshot.write_to(&paths).unwrap(), (1, 1));

        let mut fresh = new_cache(10);
        let loaded = LoadedCaches::read_from(&paths, 10, 10);
        assert_eq!(fresh.apply_loaded(loaded).unwrap(), (1, 1));
        assert_eq!(fresh.cache_stat(CacheKind::Address).hits, 1);
        assert_eq!(fresh.lookup_address("58.5", "16.5"), None);
    }

    #[test]
    fn test_apply_loaded_keeps_good_files() {
        let dir = TempDir::new().unwrap();
        let paths = CachePaths::in_dir(dir.path());
        fs::write(&paths.address_file, "1700000000;59.5;17.5;Main Street 1\n").unwrap();
        fs::write(&paths.stats_file, "garbage\n").unwrap();

        let mut cache = new_cache(10);
        let loaded = LoadedCaches::read_from(&paths, 10, 10);
        assert!(cache.apply_loaded(loaded).is_err());
        assert_eq!(cache.cache_count(CacheKind::Address).0, 1);
    }
}
