//! Error types for cadsync

use thiserror::Error;

use crate::models::{EntityErrorKind, ObjectId, ProjectId};

#[derive(Debug, Error)]
pub enum CadSyncError {
    // Per-entity errors, recovered by skipping the entity
    #[error("Malformed or unsupported entity {handle}: {reason}")]
    Parse { handle: String, reason: String },

    #[error("Invalid geometry for entity {handle}: {reason}")]
    GeometryInvalid { handle: String, reason: String },

    #[error("Round-trip transform error {error:.6} exceeds tolerance {tolerance} ({from} -> {to})")]
    TransformOutOfTolerance {
        from: u32,
        to: u32,
        error: f64,
        tolerance: f64,
    },

    #[error("Cannot transform from SRID {from} to SRID {to}: {reason}")]
    TransformUnsupported { from: u32, to: u32, reason: String },

    // Registry errors
    #[error("No active entity link for handle {handle} in project {project_id}")]
    LinkNotFound { project_id: ProjectId, handle: String },

    #[error("Concurrent import created a link for handle {handle} in project {project_id}")]
    ConcurrentImportConflict { project_id: ProjectId, handle: String },

    // Lookup errors
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Invalid review transition for object {object_id}: {reason}")]
    InvalidReview { object_id: ObjectId, reason: String },

    #[error("Unsupported drawing format: {0}")]
    UnsupportedFormat(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CadSyncError {
    /// Errors that only affect the entity being processed
    pub fn is_entity_scoped(&self) -> bool {
        self.entity_error_kind().is_some()
    }

    /// Report category for entity-scoped errors
    pub fn entity_error_kind(&self) -> Option<EntityErrorKind> {
        match self {
            CadSyncError::Parse { .. } => Some(EntityErrorKind::Parse),
            CadSyncError::GeometryInvalid { .. } => Some(EntityErrorKind::GeometryInvalid),
            CadSyncError::TransformOutOfTolerance { .. } => {
                Some(EntityErrorKind::TransformOutOfTolerance)
            }
            CadSyncError::TransformUnsupported { .. } => Some(EntityErrorKind::TransformUnsupported),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CadSyncError {
    fn from(err: serde_json::Error) -> Self {
        CadSyncError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CadSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_scope() {
        let err = CadSyncError::GeometryInvalid {
            handle: "2F".to_string(),
            reason: "line has 1 vertex".to_string(),
        };
        assert!(err.is_entity_scoped());
        assert_eq!(err.entity_error_kind(), Some(EntityErrorKind::GeometryInvalid));

        let err = CadSyncError::ConcurrentImportConflict {
            project_id: ProjectId::new(),
            handle: "2F".to_string(),
        };
        assert!(!err.is_entity_scoped());
        assert!(!CadSyncError::Storage("connection reset".to_string()).is_entity_scoped());
    }

    #[test]
    fn test_messages_name_the_handle() {
        let err = CadSyncError::Parse {
            handle: "A0".to_string(),
            reason: "unmapped entity kind HATCH".to_string(),
        };
        assert!(err.to_string().contains("A0"));
        assert!(err.to_string().contains("HATCH"));
    }
}
