use crate::cli::StorageBackend;
use anyhow::{Context, Result};
use cadsync_store::postgres::{PostgresConfig, PostgresStore};
use cadsync_store::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub enum Storage {
    /// Snapshot loaded at start and written back after mutating commands
    Memory { store: Arc<MemoryStore>, state: PathBuf },
    Postgres(Arc<PostgresStore>),
}

impl Storage {
    pub async fn open(backend: StorageBackend, state: &Path) -> Result<Self> {
        match backend {
            StorageBackend::Memory => Self::open_memory(state).await,
            StorageBackend::Postgres => Self::open_postgres().await,
        }
    }

    async fn open_memory(state: &Path) -> Result<Self> {
        let store = MemoryStore::load_snapshot(state)
            .await
            .with_context(|| format!("Failed to load state snapshot {}", state.display()))?;
        tracing::debug!(path = %state.display(), "Loaded memory snapshot");
        Ok(Self::Memory { store: Arc::new(store), state: state.to_path_buf() })
    }

    async fn open_postgres() -> Result<Self> {
        let config = PostgresConfig::from_env().context(
            "Failed to load PostgreSQL configuration. Set DATABASE_URL environment variable.",
        )?;

        let store = PostgresStore::new(config.clone()).await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to PostgreSQL at {}\n\n\
                    Remediation:\n\
                      1. Ensure PostgreSQL with PostGIS is running\n\
                      2. Check DATABASE_URL environment variable\n\
                      3. Run `cadsync db migrate` once against a new database\n\n\
                    Error: {}",
                redact(&config.database_url),
                e
            )
        })?;
        Ok(Self::Postgres(Arc::new(store)))
    }

    /// Write the memory snapshot back to disk; PostgreSQL commits as it goes
    pub async fn persist(&self) -> Result<()> {
        if let Self::Memory { store, state } = self {
            store
                .save_snapshot(state)
                .await
                .with_context(|| format!("Failed to write state snapshot {}", state.display()))?;
        }
        Ok(())
    }
}

/// Strip credentials from a connection URL before printing it
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***@{}", &url[..scheme], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
