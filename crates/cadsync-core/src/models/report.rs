//! Structured reports returned by import, reimport and export.

use serde::{Deserialize, Serialize};

use super::object::ObjectRef;
use super::project::ProjectId;

/// Category of a per-entity failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityErrorKind {
    Parse,
    GeometryInvalid,
    TransformOutOfTolerance,
    TransformUnsupported,
    Other,
}

/// A skipped entity and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityError {
    pub handle: String,
    pub layer: String,
    pub kind: EntityErrorKind,
    pub message: String,
}

/// What happened to one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityStatus {
    /// Created as a typed object
    Specific { object: ObjectRef, confidence: f64 },
    /// Created as a generic object awaiting review
    NeedsReview { object: ObjectRef, confidence: f64 },
    Modified { object: ObjectRef },
    Unchanged { object: ObjectRef },
    Deleted { object: ObjectRef },
    Skipped { kind: EntityErrorKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub handle: String,
    pub layer: String,
    #[serde(flatten)]
    pub status: EntityStatus,
}

/// Result of a first import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub project_id: ProjectId,
    pub source_name: String,
    pub total_parsed: usize,
    pub specific: usize,
    pub generic: usize,
    pub skipped: usize,
    pub entities: Vec<EntityOutcome>,
    pub errors: Vec<EntityError>,
    pub cancelled: bool,
}

impl ImportReport {
    pub fn new(project_id: ProjectId, source_name: impl Into<String>, total_parsed: usize) -> Self {
        Self {
            project_id,
            source_name: source_name.into(),
            total_parsed,
            specific: 0,
            generic: 0,
            skipped: 0,
            entities: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: EntityOutcome) {
        match outcome.status {
            EntityStatus::Specific { .. } => self.specific += 1,
            EntityStatus::NeedsReview { .. } => self.generic += 1,
            EntityStatus::Skipped { .. } => self.skipped += 1,
            _ => {}
        }
        self.entities.push(outcome);
    }

    pub fn record_error(&mut self, error: EntityError) {
        self.record(EntityOutcome {
            handle: error.handle.clone(),
            layer: error.layer.clone(),
            status: EntityStatus::Skipped { kind: error.kind },
        });
        self.errors.push(error);
    }

    /// Objects waiting in the review queue
    pub fn needs_review(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.entities
            .iter()
            .filter(|e| matches!(e.status, EntityStatus::NeedsReview { .. }))
    }
}

/// Result of a reimport against existing links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReimportReport {
    pub project_id: ProjectId,
    pub source_name: String,
    pub total_parsed: usize,
    pub new: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// New entities that needed review
    pub new_generic: usize,
    pub entities: Vec<EntityOutcome>,
    pub errors: Vec<EntityError>,
    /// Objects whose geometry changed and need downstream reprocessing
    pub geometry_changed: Vec<ObjectRef>,
    pub cancelled: bool,
}

impl ReimportReport {
    pub fn new(project_id: ProjectId, source_name: impl Into<String>, total_parsed: usize) -> Self {
        Self {
            project_id,
            source_name: source_name.into(),
            total_parsed,
            new: 0,
            modified: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
            new_generic: 0,
            entities: Vec::new(),
            errors: Vec::new(),
            geometry_changed: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: EntityOutcome) {
        match &outcome.status {
            EntityStatus::Specific { .. } => self.new += 1,
            EntityStatus::NeedsReview { .. } => {
                self.new += 1;
                self.new_generic += 1;
            }
            EntityStatus::Modified { object } => {
                self.modified += 1;
                self.geometry_changed.push(*object);
            }
            EntityStatus::Unchanged { .. } => self.unchanged += 1,
            EntityStatus::Deleted { .. } => self.deleted += 1,
            EntityStatus::Skipped { .. } => self.skipped += 1,
        }
        self.entities.push(outcome);
    }

    pub fn record_error(&mut self, error: EntityError) {
        self.record(EntityOutcome {
            handle: error.handle.clone(),
            layer: error.layer.clone(),
            status: EntityStatus::Skipped { kind: error.kind },
        });
        self.errors.push(error);
    }

    /// True when the run changed nothing
    pub fn is_noop(&self) -> bool {
        self.new == 0 && self.modified == 0 && self.deleted == 0
    }
}

/// An object left out of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSkip {
    pub object: ObjectRef,
    pub reason: String,
}

/// Summary of an export run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub objects_written: usize,
    pub layers: Vec<String>,
    pub skipped: Vec<ExportSkip>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectId, ObjectKind};

    fn outcome(status: EntityStatus) -> EntityOutcome {
        EntityOutcome { handle: "A1".to_string(), layer: "0".to_string(), status }
    }

    #[test]
    fn test_reimport_counts() {
        let object = ObjectRef::new(ObjectKind::UtilityLine, ObjectId::new());
        let mut report = ReimportReport::new(ProjectId::new(), "site.dxf", 3);
        report.record(outcome(EntityStatus::Modified { object }));
        report.record(outcome(EntityStatus::Unchanged { object }));
        report.record(outcome(EntityStatus::NeedsReview { object, confidence: 0.3 }));

        assert_eq!(report.modified, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.new, 1);
        assert_eq!(report.new_generic, 1);
        assert_eq!(report.geometry_changed, vec![object]);
        assert!(!report.is_noop());
    }

    #[test]
    fn test_import_error_counts_as_skipped() {
        let mut report = ImportReport::new(ProjectId::new(), "site.dxf", 1);
        report.record_error(EntityError {
            handle: "FF".to_string(),
            layer: "0".to_string(),
            kind: EntityErrorKind::GeometryInvalid,
            message: "empty".to_string(),
        });
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.entities.len(), 1);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let json = serde_json::to_value(outcome(EntityStatus::Skipped {
            kind: EntityErrorKind::Parse,
        }))
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["kind"], "parse");
        assert_eq!(json["handle"], "A1");
    }
}
