use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadsync_core::CadSyncError;
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), details: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.message, details: self.details };
        (self.status, Json(body)).into_response()
    }
}

impl From<CadSyncError> for ApiError {
    fn from(err: CadSyncError) -> Self {
        let details = err.to_string();
        let error = match &err {
            CadSyncError::ProjectNotFound(_) => Self::not_found("Project not found"),
            CadSyncError::ObjectNotFound(_) => Self::not_found("Object not found"),
            CadSyncError::LinkNotFound { .. } => Self::not_found("Entity link not found"),
            CadSyncError::UnsupportedFormat(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported drawing format")
            }
            CadSyncError::Parse { .. } => Self::bad_request("Drawing could not be parsed"),
            CadSyncError::ConfigMissing { .. } | CadSyncError::ConfigInvalid { .. } => {
                Self::bad_request("Invalid request configuration")
            }
            CadSyncError::InvalidReview { .. } => {
                Self::new(StatusCode::CONFLICT, "Review transition not allowed")
            }
            CadSyncError::ConcurrentImportConflict { .. } => {
                Self::new(StatusCode::CONFLICT, "Concurrent import conflict")
            }
            CadSyncError::GeometryInvalid { .. }
            | CadSyncError::TransformOutOfTolerance { .. }
            | CadSyncError::TransformUnsupported { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "Geometry rejected")
            }
            CadSyncError::Storage(_) | CadSyncError::Io(_) | CadSyncError::Serialization(_) => {
                tracing::error!(error = %err, "Request failed");
                Self::internal("Internal error")
            }
        };
        error.with_details(details)
    }
}
