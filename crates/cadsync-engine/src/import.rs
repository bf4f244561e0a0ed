//! Per-entity import stages
//!
//! [`EntityPreparer::prepare`] is pure: it classifies, validates, hashes and
//! drafts the object. [`create_object`] is the persistence step for a handle
//! seen for the first time.

use cadsync_core::config::SyncConfig;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{
    CanonicalObject, ClassificationResult, Crs, DrawingEntity, EntityKind, EntityStatus,
    LinkUpsert, Project,
};
use cadsync_geo::validation::ensure_valid;
use cadsync_geo::{CoordinateTransformer, GeometryHasher};
use cadsync_store::UnitOfWork;

use crate::layers::LayerClassifier;
use crate::objects::ObjectBuilder;
use crate::registry::LinkRegistry;

/// An entity that passed every per-entity check
#[derive(Debug, Clone)]
pub struct PreparedEntity {
    pub handle: String,
    pub layer: String,
    pub kind: EntityKind,
    pub geometry_hash: String,
    pub classification: ClassificationResult,
    /// Object to insert if the handle turns out to be new
    pub draft: CanonicalObject,
}

/// Pure per-entity stage shared by import and reimport
pub struct EntityPreparer<'a> {
    project: &'a Project,
    classifier: &'a LayerClassifier,
    hasher: GeometryHasher,
    transformer: CoordinateTransformer,
    builder: ObjectBuilder,
    verify_crs: Option<Crs>,
}

impl<'a> EntityPreparer<'a> {
    pub fn new(project: &'a Project, classifier: &'a LayerClassifier, config: &SyncConfig) -> Self {
        Self {
            project,
            classifier,
            hasher: GeometryHasher::new(config.hash_precision),
            transformer: CoordinateTransformer::new(config.transform_tolerance)
                .with_georeference(project.georeference.clone()),
            builder: ObjectBuilder::new(config.specific_threshold),
            verify_crs: config.verify_srid.map(Crs::epsg),
        }
    }

    /// Drawing coordinates are stored as-is, in the local CRS
    pub fn storage_crs(&self) -> Crs {
        Crs::local()
    }

    /// Run the checks and build the draft object
    ///
    /// Every error returned here is entity scoped.
    pub fn prepare(&self, entity: &DrawingEntity) -> Result<PreparedEntity> {
        if entity.handle.trim().is_empty() {
            return Err(CadSyncError::Parse {
                handle: entity.handle.clone(),
                reason: "entity has no handle".to_string(),
            });
        }
        if !entity.kind.is_mapped() {
            return Err(CadSyncError::Parse {
                handle: entity.handle.clone(),
                reason: format!("unmapped entity kind {}", entity.kind),
            });
        }

        ensure_valid(&entity.handle, &entity.geometry)?;

        let storage_crs = self.storage_crs();
        if let Some(verify) = &self.verify_crs {
            self.transformer.verify_round_trip(&entity.geometry, &storage_crs, verify)?;
        }

        let classification = self.classifier.classify(&entity.layer);
        let geometry_hash = self.hasher.hash(&entity.geometry);
        let draft = self.builder.build(self.project.id, entity, &classification, storage_crs);

        Ok(PreparedEntity {
            handle: entity.handle.clone(),
            layer: entity.layer.clone(),
            kind: entity.kind.clone(),
            geometry_hash,
            classification,
            draft,
        })
    }
}

impl PreparedEntity {
    pub fn link_upsert(&self, drawing_id: Option<&str>, object: &CanonicalObject) -> LinkUpsert {
        LinkUpsert {
            project_id: object.project_id,
            drawing_id: drawing_id.map(str::to_string),
            source_handle: self.handle.clone(),
            source_layer: self.layer.clone(),
            source_kind: self.kind.clone(),
            geometry_hash: self.geometry_hash.clone(),
            object_ref: object.object_ref(),
        }
    }

    /// Status reported once the draft is stored as a new object
    pub fn created_status(&self) -> EntityStatus {
        let object = &self.draft;
        if object.needs_review() {
            EntityStatus::NeedsReview { object: object.object_ref(), confidence: object.quality_score }
        } else {
            EntityStatus::Specific { object: object.object_ref(), confidence: object.quality_score }
        }
    }
}

/// Insert the drafted object and link the handle to it
pub async fn create_object<U: UnitOfWork + ?Sized>(
    unit: &U,
    prepared: &PreparedEntity,
    drawing_id: Option<&str>,
) -> Result<EntityStatus> {
    let object = &prepared.draft;
    unit.insert_object(object).await?;
    LinkRegistry::new(unit)
        .upsert_link(prepared.link_upsert(drawing_id, object))
        .await?;

    let status = prepared.created_status();

    tracing::debug!(
        handle = %prepared.handle,
        layer = %prepared.layer,
        object = %object.object_ref(),
        confidence = prepared.classification.confidence,
        "Created object"
    );
    Ok(status)
}
