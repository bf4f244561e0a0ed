pub mod classification;
pub mod drawing;
pub mod geometry;
pub mod link;
pub mod object;
pub mod project;
pub mod report;

pub use classification::{
    ClassificationResult, MatchSource, PatternRule, Phase, TokenSlot, TokenSlotKey,
};
pub use drawing::{DrawingEntity, EntityKind, ParseIssue, ParsedDrawing, RawAttributes};
pub use geometry::{Crs, Geometry, GeometryType};
pub use link::{EntityLink, LinkId, LinkUpsert};
pub use object::{
    Alignment, Bmp, CanonicalObject, GenericObject, ObjectAttributes, ObjectId, ObjectKind,
    ObjectRef, ReviewStatus, SurveyPoint, SyncState, UtilityLine, UtilityStructure,
};
pub use project::{Project, ProjectId};
pub use report::{
    EntityError, EntityErrorKind, EntityOutcome, EntityStatus, ExportSkip, ExportSummary,
    ImportReport, ReimportReport,
};
