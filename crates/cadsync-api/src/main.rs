use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use cadsync_engine::SyncEngine;
use cadsync_store::postgres::{PostgresConfig, PostgresStore};
use cadsync_store::{CadStore, MemoryStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadsync_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadsync_api=info,cadsync_engine=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env().context("Invalid configuration")?;

    tracing::info!(
        port = config.port,
        threshold = config.sync.specific_threshold,
        postgres = config.uses_postgres(),
        "Starting CadSync API server"
    );

    match &config.database_url {
        Some(database_url) => {
            tracing::info!("DATABASE_URL found, connecting to PostgreSQL...");
            let store = init_postgres_storage(database_url).await.map_err(|e| {
                tracing::error!(
                    "Remediation:\n\
                    1. Ensure PostgreSQL with PostGIS is running\n\
                    2. Verify DATABASE_URL is correct\n\
                    3. Check that the database exists and is accessible"
                );
                e
            })?;
            tracing::info!("Connected to PostgreSQL");
            serve(store, config).await
        }
        None => {
            let store = match &config.state_path {
                Some(path) => {
                    tracing::info!(path = %path.display(), "Loading memory snapshot");
                    MemoryStore::load_snapshot(path)
                        .await
                        .with_context(|| format!("Failed to load {}", path.display()))?
                }
                None => MemoryStore::new(),
            };
            tracing::info!("Using in-memory storage (set DATABASE_URL for PostgreSQL)");
            serve(Arc::new(store), config).await
        }
    }
}

async fn serve<S: CadStore + 'static>(store: Arc<S>, config: ApiConfig) -> Result<()> {
    let state = Arc::new(AppState::new(SyncEngine::new(store, config.sync.clone())));

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CADSYNC_CORS_ORIGIN '{}'", config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = create_router(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("CORS enabled for {}", config.cors_origin);

    axum::serve(listener, app).await.context("Server error")
}

/// Initialize PostgreSQL storage from a database URL
async fn init_postgres_storage(database_url: &str) -> Result<Arc<PostgresStore>> {
    let config = PostgresConfig::new(database_url.to_string()).context("Invalid DATABASE_URL")?;

    PostgresStore::with_migrations(config)
        .await
        .map(Arc::new)
        .context("Connection failed")
}
