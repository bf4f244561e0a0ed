use cadsync_core::config::{LayeredConfig, SyncConfig};
use cadsync_core::error::Result;
use std::env;
use std::path::PathBuf;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub cors_origin: String,
    pub database_url: Option<String>,
    /// Snapshot preloaded into the memory store when no database is configured
    pub state_path: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    ///
    /// Engine settings follow the usual layering; `CADSYNC_CONFIG` names an
    /// optional TOML file.
    pub fn from_env() -> Result<Self> {
        let port = env::var("CADSYNC_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3001);

        let cors_origin =
            env::var("CADSYNC_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let database_url = env::var("DATABASE_URL").ok();
        let state_path = env::var("CADSYNC_STATE").ok().map(PathBuf::from);

        let mut layered = LayeredConfig::with_defaults();
        if let Ok(path) = env::var("CADSYNC_CONFIG") {
            layered = layered.load_from_file(path)?;
        }
        let sync = layered.load_from_env().resolve()?;

        Ok(Self { port, cors_origin, database_url, state_path, sync })
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Check if PostgreSQL storage is configured
    pub fn uses_postgres(&self) -> bool {
        self.database_url.is_some()
    }
}
