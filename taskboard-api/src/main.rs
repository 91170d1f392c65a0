//! # Taskboard API Server
//!
//! Serves the task dashboard, the JSON API and the backup trigger.
//!
//! ## Startup
//!
//! 1. Load and validate configuration (`taskboard.toml`, `.env`, environment)
//! 2. Create a lazily connecting PostgreSQL pool
//! 3. Bootstrap the schema; if the database is down this is logged and retried
//!    on the first request instead of aborting
//! 4. Set up blob storage (backups and attachments) when credentials are present
//! 5. Serve until Ctrl-C / SIGTERM, then close the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskboard-api
//! ```

use std::sync::Arc;
use taskboard_api::{
    app::{build_router, AppState},
    config::Config,
    telemetry::{self, LogFormat},
};
use taskboard_shared::db::pool::create_pool;
use taskboard_shared::storage::{AzureBlobStore, BlobStore};
use taskboard_shared::store::{PgStore, TaskStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(LogFormat::from_env());

    tracing::info!(
        "Taskboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");

    let pool = create_pool(&config.database)?;
    let store = Arc::new(PgStore::new(pool));

    if let Err(err) = store.ensure_schema().await {
        tracing::warn!(
            error = %err,
            "Database not ready at startup; schema bootstrap will be retried on first use"
        );
    }

    let blobs: Option<Arc<dyn BlobStore>> = match &config.storage {
        Some(storage) => {
            let blobs = AzureBlobStore::new(storage.clone())?;
            tracing::info!(backend = %blobs.describe(), "Backups and attachments enabled");
            Some(Arc::new(blobs))
        }
        None => {
            tracing::info!("Blob storage not configured; backups and attachments disabled");
            None
        }
    };

    let address = config.bind_address();
    let state = AppState::new(store.clone(), blobs, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
