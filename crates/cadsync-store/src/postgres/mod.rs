//! PostgreSQL/PostGIS storage adapter

pub mod config;
pub mod migrations;
pub mod transaction;

mod links;
mod objects;
mod reference;

pub use config::{ConfigError, PoolConfig, PostgresConfig};
pub use migrations::{MigrationError, MigrationManager, MigrationStatus};
pub use transaction::PgUnitOfWork;

use std::fmt::Display;

use cadsync_core::error::{CadSyncError, Result};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

pub(crate) fn storage_error(context: &str, e: impl Display) -> CadSyncError {
    CadSyncError::Storage(format!("{}: {}", context, e))
}

/// PostgreSQL storage adapter
pub struct PostgresStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresStore {
    /// Connect with the given configuration
    ///
    /// Pending migrations are applied when `auto_migrate` is set.
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        config.validate().map_err(|e| match e {
            ConfigError::Missing(key) => CadSyncError::ConfigMissing { key },
            ConfigError::Invalid { key, reason } => CadSyncError::ConfigInvalid { key, reason },
        })?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .idle_timeout(config.pool.idle_timeout)
            .max_lifetime(config.pool.max_lifetime)
            .connect(&config.database_url)
            .await
            .map_err(|e| storage_error("Failed to connect to database", e))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| storage_error("Connection test failed", e))?;

        let store = Self { pool, config };
        if store.config.auto_migrate {
            store.run_migrations().await?;
        }

        tracing::debug!(
            max_connections = store.config.pool.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Connect and run migrations regardless of `auto_migrate`
    pub async fn with_migrations(config: PostgresConfig) -> Result<Self> {
        let store = Self::new(config).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        MigrationManager::new(self.pool.clone())
            .run_migrations()
            .await
            .map_err(|e| storage_error("Migration failed", e))
    }

    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        MigrationManager::new(self.pool.clone())
            .check_status()
            .await
            .map_err(|e| storage_error("Failed to check migration status", e))
    }

    pub async fn has_pending_migrations(&self) -> Result<bool> {
        MigrationManager::new(self.pool.clone())
            .has_pending_migrations()
            .await
            .map_err(|e| storage_error("Failed to check pending migrations", e))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("Health check failed", e))?;
        Ok(())
    }

    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| storage_error("Failed to acquire connection", e))
    }
}
