//! # shivalik-server
//!
//! HTTP backend for the Shivalik class social network.
//!
//! This binary provides:
//! - **Identity** routes for signup, login, search and profile pictures
//! - **Friend requests** backed by the transactional relationship engine in
//!   `shivalik-store`
//! - **Posts and feed** with likes and append-only comments
//! - **Local media storage** for uploaded profile pictures

mod api;
mod config;
mod credentials;
mod error;
mod media_store;

use std::sync::{Arc, Mutex};

use shivalik_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::credentials::Argon2CredentialHasher;
use crate::media_store::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,shivalik_server=debug,shivalik_store=debug")
        }))
        .init();

    info!("Starting Shivalik server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store and collaborators
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path, config.store_timeout)?;
    info!(path = %config.database_path.display(), "Database opened");

    let media = MediaStore::new(
        config.media_storage_path.clone(),
        config.media_base_url.clone(),
        config.max_upload_size,
    )
    .await?;

    let db = Arc::new(Mutex::new(db));
    let app_state = AppState {
        db: db.clone(),
        media: Arc::new(media),
        credentials: Arc::new(Argon2CredentialHasher::default()),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server until Ctrl+C
    // -----------------------------------------------------------------------
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Received Ctrl+C, shutting down");
    };

    if let Err(e) = api::serve(app_state, config.http_addr, shutdown).await {
        tracing::error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    // -----------------------------------------------------------------------
    // 5. Close the store once every request handle is gone
    // -----------------------------------------------------------------------
    match Arc::try_unwrap(db) {
        Ok(mutex) => {
            let db = mutex
                .into_inner()
                .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
            db.close()?;
            info!("Database closed");
        }
        Err(_) => tracing::warn!("Database still shared at shutdown, dropping without close"),
    }

    Ok(())
}
