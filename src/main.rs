//! ColdStorage admin server
//!
//! Serves the cache admin API over a file-backed blob store and commits the
//! cache on graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coldstorage::api::create_router;
use coldstorage::{spawn_purge_task, AppState, ColdStorage, Config, FileBlobStore};

/// Main entry point for the ColdStorage server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the file-backed blob store and initialize the engine
/// 4. Start background stale purge task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM, then commit
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coldstorage=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ColdStorage server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_memory_bytes={}, default_ttl_ms={:?}, workers={}, port={}, purge_interval={}s",
        config.max_memory_bytes,
        config.default_ttl_ms,
        config.worker_threads,
        config.server_port,
        config.purge_interval
    );

    let blobs = FileBlobStore::open(&config.data_dir, &config.namespace)
        .context("failed to open blob store")?;
    info!("Blob store opened at {}", blobs.path().display());

    let port = config.server_port;
    let purge_interval = config.purge_interval;
    let cache = ColdStorage::initialize(config, Arc::new(blobs))
        .context("failed to initialize cache engine")?;

    let purge_handle = spawn_purge_task(cache.clone(), purge_interval);
    info!("Background purge task started");

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(purge_handle))
        .await
        .context("server error")?;

    // Commit is synchronous I/O; keep it off the async workers
    match tokio::task::spawn_blocking(move || cache.commit()).await {
        Ok(Ok(report)) => info!(written = report.written, "Final commit complete"),
        Ok(Err(e)) => error!(error = %e, "Final commit failed"),
        Err(e) => error!(error = %e, "Final commit task failed"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the purge task and allows graceful shutdown.
async fn shutdown_signal(purge_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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

    purge_handle.abort();
    warn!("Purge task aborted");
}
