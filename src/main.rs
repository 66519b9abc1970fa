//! Geoloc Cache - A geolocation cache daemon for GPS trackers
//!
//! Serves cached street addresses and minimap images over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoloc_cache::{create_router, spawn_autosave_task, AppState, Config};

/// Main entry point for the geolocation cache daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create caches, rate limiters and the upstream client
/// 4. Rehydrate the caches from the data directory
/// 5. Start the background autosave task
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM, then save the caches
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoloc_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Geoloc Cache daemon");

    let config = Config::from_env();
    info!(
        "Configuration loaded: address_cache_size={}, minimap_cache_size={}, proximity_radius={}m, port={}, data_dir={}",
        config.address_cache_size,
        config.minimap_cache_size,
        config.proximity_radius,
        config.server_port,
        config.data_dir.display()
    );
    if config.api_key.is_none() {
        warn!("No API key configured, using anonymous provider access");
    }

    let state = AppState::from_config(&config).context("invalid minimap configuration")?;
    let service = state.service.clone();

    if config.load_cache {
        if let Err(e) = service.load_caches().await {
            error!("Failed to load caches, starting empty: {}", e);
        }
    }

    let autosave_handle = (config.autosave_interval > 0)
        .then(|| spawn_autosave_task(service.clone(), config.autosave_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(autosave_handle))
        .await
        .context("server error")?;

    if config.save_cache {
        match service.save_caches().await {
            Ok((addresses, minimaps)) => {
                info!("Caches saved: {} addresses, {} minimaps", addresses, minimaps)
            }
            Err(e) => error!("Failed to save caches: {}", e),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the autosave task so the final save runs alone.
async fn shutdown_signal(autosave_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = autosave_handle {
        handle.abort();
        warn!("Autosave task aborted");
    }
}
