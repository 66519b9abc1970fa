//! Cache Autosave Task
//!
//! Background task that periodically writes the caches to the data directory,
//! so a crash loses at most one interval of lookups.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::upstream::GeolocService;

/// Spawns a background task that saves both caches every `interval_secs`.
///
/// A failed save is logged and retried at the next tick. The returned handle
/// is aborted during graceful shutdown, before the final save.
///
/// # Example
/// ```ignore
/// let autosave_handle = spawn_autosave_task(service.clone(), 300);
/// // Later, during shutdown:
/// autosave_handle.abort();
/// ```
pub fn spawn_autosave_task(service: GeolocService, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache autosave task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match service.save_caches().await {
                Ok((addresses, minimaps)) => {
                    debug!("Autosave: {} addresses, {} minimaps", addresses, minimaps)
                }
                Err(e) => error!("Autosave failed: {}", e),
            }
        }
    })
}
