// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::application::data_cache::{spawn_sweeper, DataCache};
use crate::application::persistence::SnapshotPersistence;
use crate::application::report_registry::ReportRegistry;
use crate::application::snapshot_store::LocalSnapshotStore;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::file_store::FileSnapshotStore;
use crate::infrastructure::http_snapshot_store::HttpSnapshotStore;
use crate::infrastructure::memory_store::MemorySnapshotStore;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config().context("Failed to load configuration")?;

    // Local snapshot store (infrastructure layer)
    let local: Arc<dyn LocalSnapshotStore> = match &config.storage.dir {
        Some(dir) => {
            tracing::info!("Storing snapshots under {}", dir.display());
            Arc::new(FileSnapshotStore::open(dir)?)
        }
        None => {
            tracing::warn!("No storage directory configured, snapshots are kept in memory");
            Arc::new(MemorySnapshotStore::default())
        }
    };

    // Persistence, optionally replicated to the remote store
    let persistence = match &config.remote {
        Some(remote) => {
            let store = HttpSnapshotStore::new(
                remote.base_url.clone(),
                remote.token.clone(),
                remote.timeout(),
            )?;
            let (persistence, replicator) = SnapshotPersistence::replicated(local, Arc::new(store));
            replicator.spawn();
            tracing::info!("Replicating snapshots to {}", remote.base_url);
            persistence
        }
        None => SnapshotPersistence::local_only(local),
    };

    // Shared widget cache with periodic sweep
    let widget_cache = Arc::new(Mutex::new(DataCache::new(
        config.cache.max_size,
        config.cache.default_ttl(),
    )));
    let _sweeper = spawn_sweeper(widget_cache.clone(), config.cache.sweep_interval());

    // Create application state
    let registry = ReportRegistry::new(widget_cache, Arc::new(persistence), config.grid);
    let state = Arc::new(AppState {
        registry: Arc::new(registry),
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting report-grid service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
