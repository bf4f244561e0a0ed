//! CadSync Engine - Import, reimport and export pipelines
//!
//! This crate classifies drawing layers, turns entities into canonical
//! objects, keeps the entity link registry in step with each reimport, and
//! regenerates drawings from the stored objects.

pub mod engine;
pub mod export;
pub mod import;
pub mod layers;
pub mod objects;
pub mod registry;
pub mod reimport;

pub use engine::{CancelFlag, Reclassification, ReimportScope, ReviewDecision, SyncEngine};
pub use export::{ExportConfig, ExportedDrawing, LayerMode};
pub use import::{EntityPreparer, PreparedEntity};
pub use layers::{LayerClassifier, LayerGenerator};
pub use objects::ObjectBuilder;
pub use registry::LinkRegistry;
