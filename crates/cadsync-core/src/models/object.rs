//! Canonical objects produced from drawing entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::classification::Phase;
use super::drawing::EntityKind;
use super::geometry::{Crs, Geometry};
use super::project::ProjectId;

/// Unique identifier for a canonical object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ObjectId)
    }
}

/// Concrete object kind; one storage table per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    UtilityLine,
    UtilityStructure,
    Bmp,
    Alignment,
    SurveyPoint,
    Generic,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::UtilityLine,
        ObjectKind::UtilityStructure,
        ObjectKind::Bmp,
        ObjectKind::Alignment,
        ObjectKind::SurveyPoint,
        ObjectKind::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::UtilityLine => "utility_line",
            ObjectKind::UtilityStructure => "utility_structure",
            ObjectKind::Bmp => "bmp",
            ObjectKind::Alignment => "alignment",
            ObjectKind::SurveyPoint => "survey_point",
            ObjectKind::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ObjectKind::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Storage table holding objects of this kind
    pub fn table(&self) -> &'static str {
        match self {
            ObjectKind::UtilityLine => "utility_lines",
            ObjectKind::UtilityStructure => "utility_structures",
            ObjectKind::Bmp => "bmps",
            ObjectKind::Alignment => "alignments",
            ObjectKind::SurveyPoint => "survey_points",
            ObjectKind::Generic => "generic_objects",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a link to exactly one canonical object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: ObjectId,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, id: ObjectId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Synchronization state shared by links and objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Active,
    /// Object geometry changed; downstream relationship builders must reprocess it
    ///
    /// Sync never clears this state. An unchanged reimport does not write the
    /// object, so the flag stays set until the consumer that reprocesses the
    /// object moves it back to `Active`. `updated_at` dates the change.
    Modified,
    Deleted,
    Conflict,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Active => "active",
            SyncState::Modified => "modified",
            SyncState::Deleted => "deleted",
            SyncState::Conflict => "conflict",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SyncState::Active),
            "modified" => Some(SyncState::Modified),
            "deleted" => Some(SyncState::Deleted),
            "conflict" => Some(SyncState::Conflict),
            _ => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, SyncState::Deleted)
    }
}

/// Review workflow for generic objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Reclassified,
    Ignored,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Reclassified => "reclassified",
            ReviewStatus::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "reclassified" => Some(ReviewStatus::Reclassified),
            "ignored" => Some(ReviewStatus::Ignored),
            _ => None,
        }
    }

    /// Reclassified objects are audit records and never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::Reclassified)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityLine {
    /// Utility system code, e.g. `STORM`, `WATER`
    pub system: String,
    pub diameter_in: Option<f64>,
    pub material: Option<String>,
    /// 3-D length in drawing units
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityStructure {
    /// Structure code, e.g. `MH`, `CB`
    pub structure_type: String,
    pub system: Option<String>,
    pub rim_elevation: Option<f64>,
}

/// Stormwater best management practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bmp {
    pub bmp_type: String,
    /// Plan area in square drawing units
    pub area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub alignment_type: String,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPoint {
    pub point_type: String,
    pub elevation: f64,
    pub description: Option<String>,
}

/// Object the classifier could not type with enough confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericObject {
    pub original_layer: String,
    pub original_entity_kind: EntityKind,
    pub confidence: f64,
    pub needs_review: bool,
    pub review_status: ReviewStatus,
    pub suggested_object_type: Option<String>,
    /// Unclassified source attributes
    #[serde(default)]
    pub overflow: BTreeMap<String, String>,
    /// Drawing handle the object was created from
    #[serde(default)]
    pub source_handle: Option<String>,
}

/// Closed per-kind attribute set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectAttributes {
    UtilityLine(UtilityLine),
    UtilityStructure(UtilityStructure),
    Bmp(Bmp),
    Alignment(Alignment),
    SurveyPoint(SurveyPoint),
    Generic(GenericObject),
}

impl ObjectAttributes {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectAttributes::UtilityLine(_) => ObjectKind::UtilityLine,
            ObjectAttributes::UtilityStructure(_) => ObjectKind::UtilityStructure,
            ObjectAttributes::Bmp(_) => ObjectKind::Bmp,
            ObjectAttributes::Alignment(_) => ObjectKind::Alignment,
            ObjectAttributes::SurveyPoint(_) => ObjectKind::SurveyPoint,
            ObjectAttributes::Generic(_) => ObjectKind::Generic,
        }
    }

    pub fn as_generic(&self) -> Option<&GenericObject> {
        match self {
            ObjectAttributes::Generic(generic) => Some(generic),
            _ => None,
        }
    }

    pub fn as_generic_mut(&mut self) -> Option<&mut GenericObject> {
        match self {
            ObjectAttributes::Generic(generic) => Some(generic),
            _ => None,
        }
    }
}

/// A canonical, queryable record owned by a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObject {
    pub id: ObjectId,
    pub project_id: ProjectId,
    pub geometry: Geometry,
    pub crs: Crs,
    pub discipline: Option<String>,
    pub phase: Option<Phase>,
    pub attributes: ObjectAttributes,
    /// Classification confidence at creation time
    pub quality_score: f64,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalObject {
    pub fn new(
        project_id: ProjectId,
        geometry: Geometry,
        crs: Crs,
        attributes: ObjectAttributes,
        quality_score: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            project_id,
            geometry,
            crs,
            discipline: None,
            phase: None,
            attributes,
            quality_score,
            sync_state: SyncState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.attributes.kind()
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.id)
    }

    pub fn is_deleted(&self) -> bool {
        self.sync_state.is_deleted()
    }

    pub fn needs_review(&self) -> bool {
        self.attributes.as_generic().is_some_and(|g| g.needs_review)
    }

    /// Live objects, minus generic records superseded by a reclassification
    pub fn is_exportable(&self) -> bool {
        !self.is_deleted()
            && !self
                .attributes
                .as_generic()
                .is_some_and(|g| g.review_status == ReviewStatus::Reclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_strings() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::Generic.table(), "generic_objects");
        assert_eq!(ObjectKind::parse("pipe"), None);
    }

    #[test]
    fn test_attributes_serialize_with_kind_tag() {
        let attributes = ObjectAttributes::UtilityLine(UtilityLine {
            system: "STORM".to_string(),
            diameter_in: Some(12.0),
            material: None,
            length: 100.0,
        });
        let json = serde_json::to_value(&attributes).unwrap();
        assert_eq!(json["kind"], "utility_line");
        assert_eq!(json["diameter_in"], 12.0);

        let back: ObjectAttributes = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ObjectKind::UtilityLine);
    }

    #[test]
    fn test_reclassified_generic_is_not_exportable() {
        let mut object = CanonicalObject::new(
            ProjectId::new(),
            Geometry::point(1.0, 2.0, 3.0),
            Crs::local(),
            ObjectAttributes::Generic(GenericObject {
                original_layer: "STORM_PIPE".to_string(),
                original_entity_kind: EntityKind::Point,
                confidence: 0.3,
                needs_review: true,
                review_status: ReviewStatus::Pending,
                suggested_object_type: None,
                overflow: BTreeMap::new(),
                source_handle: Some("2A".to_string()),
            }),
            0.3,
        );
        assert!(object.is_exportable());

        if let Some(generic) = object.attributes.as_generic_mut() {
            generic.review_status = ReviewStatus::Ignored;
        }
        assert!(object.is_exportable());

        if let Some(generic) = object.attributes.as_generic_mut() {
            generic.review_status = ReviewStatus::Reclassified;
        }
        assert!(!object.is_exportable());
    }

    #[test]
    fn test_generic_without_source_handle_deserializes() {
        let json = serde_json::json!({
            "kind": "generic",
            "original_layer": "X",
            "original_entity_kind": "point",
            "confidence": 0.0,
            "needs_review": true,
            "review_status": "pending",
            "suggested_object_type": null
        });
        let attributes: ObjectAttributes = serde_json::from_value(json).unwrap();
        assert_eq!(attributes.as_generic().unwrap().source_handle, None);
    }

    #[test]
    fn test_review_status_terminal() {
        assert!(ReviewStatus::Reclassified.is_terminal());
        assert!(!ReviewStatus::Pending.is_terminal());
        assert_eq!(ReviewStatus::parse("ignored"), Some(ReviewStatus::Ignored));
        assert_eq!(SyncState::parse("deleted"), Some(SyncState::Deleted));
    }
}
