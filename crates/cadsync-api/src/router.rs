use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use cadsync_store::CadStore;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router<S: CadStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health_check))

        // Drawing synchronization
        .route("/api/v1/projects/{project_id}/import", post(handlers::import_drawing::<S>))
        .route("/api/v1/projects/{project_id}/reimport", post(handlers::reimport_drawing::<S>))
        .route("/api/v1/projects/{project_id}/export", post(handlers::export_drawing::<S>))

        .with_state(state)
}
