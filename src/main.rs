//! Cold Exporter - Binary Entry Point
//!
//! Runs one periodic export loop per configured service and serves the ops
//! HTTP surface until Ctrl-C.
//!
//! The cold tier is a local directory whose conditional writes are only
//! atomic within this process, so export leases do not coordinate separate
//! processes. Run a single `cold-exporter` per data directory.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tiered_event_store::api::{create_router, AppState};
use tiered_event_store::cold::{
    run_export_loop, ColdCatalogReader, ColdExporter, ColdObjectStorage,
    FileSystemColdObjectStorage, HybridEventStore, ObjectStorageLeaseManager,
};
use tiered_event_store::config::ServerConfig;
use tiered_event_store::event_store::{EventStore, JsonlEventStore, JsonlEventStoreConfig};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    info!(
        version = tiered_event_store::VERSION,
        data_dir = %config.data_dir.display(),
        services = ?config.service_ids,
        cold_enabled = config.cold.enabled,
        "starting cold exporter"
    );

    let hot: Arc<dyn EventStore> = Arc::new(JsonlEventStore::new(JsonlEventStoreConfig::new(
        config.hot_dir(),
    )));
    let storage: Arc<dyn ColdObjectStorage> =
        Arc::new(FileSystemColdObjectStorage::open(config.cold_dir())?);
    let leases = Arc::new(ObjectStorageLeaseManager::new(storage.clone()));
    let exporter = Arc::new(ColdExporter::new(
        hot.clone(),
        storage.clone(),
        leases,
        config.cold.clone(),
    ));

    let shutdown = CancellationToken::new();
    let mut loops = Vec::new();
    if config.cold.enabled {
        for service_id in &config.service_ids {
            loops.push(tokio::spawn(run_export_loop(
                exporter.clone(),
                service_id.clone(),
                shutdown.child_token(),
            )));
        }
    } else {
        warn!("cold export disabled, serving reads only");
    }

    let state = Arc::new(
        AppState::new(
            Arc::new(HybridEventStore::new(
                hot,
                Some(storage.clone()),
                config.cold.clone(),
            )),
            ColdCatalogReader::new(Some(storage), config.cold.clone()),
            Some(exporter),
        )
        .with_shutdown(shutdown.child_token()),
    );

    let listener = TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "ops HTTP listening");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutdown requested");
        signal_token.cancel();
    });

    let server_token = shutdown.clone();
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    for handle in loops {
        match handle.await {
            Ok(committed) => info!(committed, "export loop finished"),
            Err(e) => error!(error = %e, "export loop panicked"),
        }
    }
    info!("shutdown complete");
    Ok(())
}
