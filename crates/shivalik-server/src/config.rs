//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use shivalik_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_STORE_TIMEOUT_MS, MAX_UPLOAD_SIZE};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./shivalik.db`
    pub database_path: PathBuf,

    /// How long a store call waits on a locked database before failing.
    /// Env: `STORE_TIMEOUT_MS`
    /// Default: `5000`
    pub store_timeout: Duration,

    /// Directory where uploaded profile pictures are kept.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Public prefix for media URIs handed out as `profilePic`.
    /// Env: `MEDIA_BASE_URL`
    /// Default: `http://localhost:5000/media`
    pub media_base_url: String,

    /// Request body and upload limit in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./shivalik.db"),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            media_storage_path: PathBuf::from("./media"),
            media_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}/media"),
            max_upload_size: MAX_UPLOAD_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("STORE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.store_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid STORE_TIMEOUT_MS, using default"),
            }
        }

        if let Some(path) = lookup("MEDIA_STORAGE_PATH").filter(|p| !p.trim().is_empty()) {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Some(url) = lookup("MEDIA_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.media_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}
