//! Geolocation Service Module
//!
//! Cache-aside entry points used by the location-report handlers: consult
//! the cache, and on a miss rate-limit, call the provider, validate the reply
//! and populate the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{
    validate_address, CacheKind, CachePaths, CacheStatReport, Coordinates, GeolocCache,
    LoadedCaches, MinimapSpec,
};
use crate::config::Config;
use crate::error::{GeolocError, Result};
use crate::ratelimit::{RateLimitStatus, RateLimiter};
use crate::upstream::{GeolocStatus, LogNotifier, MapsProvider, Notifier};

/// Stored address when reverse geocoding failed
pub const ADDRESS_PLACEHOLDER: &str = "?";

/// Stored address when the geocode quota is exhausted
pub const QUOTA_PLACEHOLDER: &str = "(?)";

/// Inline retries after an over-quota reply
const QUOTA_RETRIES: u32 = 2;

// == Service Settings ==
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub geocode_interval: Duration,
    pub staticmap_interval: Duration,
    pub failed_calls_before_blocking: u32,
    pub quota_retry_delay: Duration,
    pub paths: CachePaths,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            geocode_interval: Duration::from_millis(config.geocode_interval_ms),
            staticmap_interval: Duration::from_millis(config.staticmap_interval_ms),
            failed_calls_before_blocking: config.failed_calls_before_blocking,
            quota_retry_delay: Duration::from_millis(config.quota_retry_delay_ms),
            paths: CachePaths::in_dir(&config.data_dir),
        }
    }
}

// == Geoloc Service ==
/// Shared cache, limiters and provider.
#[derive(Clone)]
pub struct GeolocService {
    /// Shared cache, read lock for lookups, write lock for updates
    pub cache: Arc<RwLock<GeolocCache>>,
    geocode_limiter: Arc<Mutex<RateLimiter>>,
    staticmap_limiter: Arc<Mutex<RateLimiter>>,
    provider: Arc<dyn MapsProvider>,
    notifier: Arc<dyn Notifier>,
    quota_retry_delay: Duration,
    paths: CachePaths,
    /// Held across a whole save or load so file rotations never interleave
    persist_lock: Arc<Mutex<()>>,
}

impl GeolocService {
    // == Constructor ==
    pub fn new(cache: GeolocCache, provider: Arc<dyn MapsProvider>, settings: ServiceSettings) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            geocode_limiter: Arc::new(Mutex::new(RateLimiter::new(
                "geocode",
                settings.geocode_interval,
                settings.failed_calls_before_blocking,
            ))),
            staticmap_limiter: Arc::new(Mutex::new(RateLimiter::new(
                "staticmap",
                settings.staticmap_interval,
                settings.failed_calls_before_blocking,
            ))),
            provider,
            notifier: Arc::new(LogNotifier),
            quota_retry_delay: settings.quota_retry_delay,
            paths: settings.paths,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the lockout notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    // == Address ==
    /// Resolves a position to a street address, from cache when possible.
    pub async fn get_address_from_latlon(&self, latitude: &str, longitude: &str) -> Result<String> {
        Coordinates::parse(latitude, longitude)?;

        if let Some(address) = self.cache.read().await.lookup_address(latitude, longitude) {
            return Ok(address);
        }

        let mut retries = 0;
        loop {
            acquire_slot(&self.geocode_limiter).await?;
            let reply = self.provider.reverse_geocode(latitude, longitude).await?;

            match reply.status {
                GeolocStatus::Ok => {
                    self.geocode_limiter.lock().await.record_success();
                    let address = reply
                        .address
                        .filter(|address| validate_address(address).is_ok())
                        .ok_or_else(|| {
                            warn!("Geocode OK without usable address for {},{}", latitude, longitude);
                            GeolocError::Upstream(GeolocStatus::UnknownError)
                        })?;
                    if let Err(e) = self
                        .cache
                        .write()
                        .await
                        .update_address(latitude, longitude, address.clone())
                    {
                        warn!("Address not cached: {}", e);
                    }
                    return Ok(address);
                }
                GeolocStatus::OverQueryLimit if retries < QUOTA_RETRIES => {
                    retries += 1;
                    debug!("Geocode over quota, retry {} of {}", retries, QUOTA_RETRIES);
                    tokio::time::sleep(self.quota_retry_delay).await;
                }
                GeolocStatus::OverQueryLimit => {
                    let mut limiter = self.geocode_limiter.lock().await;
                    if limiter.record_over_quota() {
                        self.notifier
                            .quota_lockout(limiter.name(), limiter.status().blocked_until);
                    }
                    return Err(GeolocError::Upstream(GeolocStatus::OverQueryLimit));
                }
                status => {
                    debug!("Geocode for {},{} failed: {}", latitude, longitude, status);
                    return Err(GeolocError::Upstream(status));
                }
            }
        }
    }

    /// Address to store with a location report; never fails.
    ///
    /// Falls back to `"(?)"` when the quota is exhausted and `"?"` otherwise.
    pub async fn address_for_report(&self, latitude: &str, longitude: &str) -> String {
        match self.get_address_from_latlon(latitude, longitude).await {
            Ok(address) => address,
            Err(e) if e.is_quota() => QUOTA_PLACEHOLDER.to_string(),
            Err(e) => {
                debug!("Storing placeholder address: {}", e);
                ADDRESS_PLACEHOLDER.to_string()
            }
        }
    }

    // == Minimap ==
    /// Fetches a static-map image for a position, from cache when possible.
    pub async fn get_minimap_from_latlon(
        &self,
        latitude: &str,
        longitude: &str,
        spec: MinimapSpec,
    ) -> Result<Vec<u8>> {
        Coordinates::parse(latitude, longitude)?;

        if let Some(image) = self
            .cache
            .read()
            .await
            .lookup_minimap(latitude, longitude, spec)
        {
            return Ok(image);
        }

        let mut retries = 0;
        loop {
            acquire_slot(&self.staticmap_limiter).await?;
            let reply = self.provider.static_map(latitude, longitude, spec).await?;

            match reply.status {
                GeolocStatus::Ok => {
                    self.staticmap_limiter.lock().await.record_success();
                    let image = reply
                        .image
                        .filter(|image| !image.is_empty())
                        .ok_or(GeolocError::Upstream(GeolocStatus::UnknownError))?;
                    if let Err(e) = self.cache.write().await.update_minimap(
                        latitude,
                        longitude,
                        spec,
                        image.clone(),
                    ) {
                        warn!("Minimap not cached: {}", e);
                    }
                    return Ok(image);
                }
                GeolocStatus::OverQueryLimit if retries < QUOTA_RETRIES => {
                    retries += 1;
                    debug!("Static map over quota, retry {} of {}", retries, QUOTA_RETRIES);
                    tokio::time::sleep(self.quota_retry_delay).await;
                }
                GeolocStatus::OverQueryLimit => {
                    self.staticmap_limiter.lock().await.record_over_quota();
                    return Err(GeolocError::Upstream(GeolocStatus::OverQueryLimit));
                }
                status => return Err(GeolocError::Upstream(status)),
            }
        }
    }

    // == Rate Limits ==
    /// Clears the lockout of both limiters.
    pub async fn reset_rate_limit(&self) {
        self.geocode_limiter.lock().await.reset();
        self.staticmap_limiter.lock().await.reset();
    }

    pub async fn rate_limit_status(&self) -> Vec<RateLimitStatus> {
        vec![
            self.geocode_limiter.lock().await.status(),
            self.staticmap_limiter.lock().await.status(),
        ]
    }

    // == Statistics ==
    pub async fn cache_stat(&self, kind: CacheKind) -> CacheStatReport {
        self.cache.read().await.cache_stat(kind)
    }

    pub async fn cache_count(&self, kind: CacheKind) -> (usize, usize) {
        self.cache.read().await.cache_count(kind)
    }

    // == Persistence ==
    /// Writes both caches and the counters to the data directory.
    ///
    /// Entries are copied under the read lock; the files are written on the
    /// blocking pool.
    pub async fn save_caches(&self) -> Result<(usize, usize)> {
        let _persist = self.persist_lock.lock().await;
        let snapshot = self.cache.read().await.snapshot();
        let paths = self.paths.clone();
        tokio::task::spawn_blocking(move || snapshot.write_to(&paths))
            .await
            .map_err(|e| GeolocError::Internal(format!("unable to join cache save task: {}", e)))?
    }

    /// Rehydrates both caches and the counters from the data directory.
    ///
    /// Files are read on the blocking pool and applied under the write lock.
    pub async fn load_caches(&self) -> Result<(usize, usize)> {
        let _persist = self.persist_lock.lock().await;
        let (address_capacity, minimap_capacity) = {
            let cache = self.cache.read().await;
            (
                cache.cache_count(CacheKind::Address).1,
                cache.cache_count(CacheKind::Minimap).1,
            )
        };
        let paths = self.paths.clone();
        let files = tokio::task::spawn_blocking(move || {
            LoadedCaches::read_from(&paths, address_capacity, minimap_capacity)
        })
        .await
        .map_err(|e| GeolocError::Internal(format!("unable to join cache load task: {}", e)))?;
        let loaded = self.cache.write().await.apply_loaded(files)?;
        info!(
            "Geoloc cache restored: {} addresses, {} minimaps",
            loaded.0, loaded.1
        );
        Ok(loaded)
    }
}

/// Fails fast during a lockout, otherwise waits for the limiter.
async fn acquire_slot(limiter: &Mutex<RateLimiter>) -> Result<()> {
    let mut limiter = limiter.lock().await;
    if limiter.check_blocked() {
        debug!("{} API blocked, skipping upstream call", limiter.name());
        return Err(GeolocError::Blocked24h);
    }
    limiter.throttle().await;
    Ok(())
}
