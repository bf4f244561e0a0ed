//! The sync engine: orchestrates import, reimport, export and review
//!
//! Every entity is written inside its own unit of work. Per-entity failures
//! are recorded on the report; storage failures and conflicts that survive
//! one retry end the operation.

use cadsync_core::config::SyncConfig;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::formats::FormatRegistry;
use cadsync_core::models::{
    CanonicalObject, ClassificationResult, DrawingEntity, EntityError, EntityErrorKind,
    EntityLink, EntityOutcome, EntityStatus, ImportReport, LinkUpsert, ObjectId, ObjectKind,
    ObjectRef, ParseIssue, ParsedDrawing, PatternRule, Project, ProjectId, ReimportReport,
    ReviewStatus,
};
use cadsync_geo::{CoordinateTransformer, GeometryHasher};
use cadsync_store::{CadStore, ObjectStore, ReferenceStore, Transactional, UnitOfWork};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::export::{self, ExportConfig, ExportedDrawing, LayerMode};
use crate::import::{EntityPreparer, PreparedEntity};
use crate::layers::{resolved_kind, LayerClassifier, LayerGenerator};
use crate::objects::typed_attributes;
use crate::reimport::{apply_entity, delete_entity};
use crate::registry::LinkRegistry;

/// Shared cancellation signal, checked between entities
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which links a reimport reconciles against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimportScope {
    /// Every active link in the project
    #[default]
    Project,
    /// Only links recorded for the drawing's id
    Drawing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Ignore,
}

impl ReviewDecision {
    fn status(self) -> ReviewStatus {
        match self {
            ReviewDecision::Approve => ReviewStatus::Approved,
            ReviewDecision::Ignore => ReviewStatus::Ignored,
        }
    }
}

/// Outcome of promoting a generic object to a typed one
#[derive(Debug, Clone, Serialize)]
pub struct Reclassification {
    pub previous: ObjectRef,
    pub object: CanonicalObject,
    pub link: Option<EntityLink>,
    /// False when the link had to be rewritten through `upsert_link`
    pub link_retargeted: bool,
}

/// Per-project state loaded once per operation
struct ProjectContext {
    project: Project,
    classifier: LayerClassifier,
    rules: Vec<PatternRule>,
}

pub struct SyncEngine<S: CadStore> {
    store: Arc<S>,
    config: SyncConfig,
    formats: FormatRegistry,
}

impl<S: CadStore> SyncEngine<S> {
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        Self { store, config, formats: FormatRegistry::with_defaults() }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Read a drawing from disk and import it
    pub async fn import(&self, project_id: ProjectId, path: &Path) -> Result<ImportReport> {
        let drawing = self.formats.read(path).await?;
        self.import_drawing(project_id, &drawing, &CancelFlag::new()).await
    }

    /// Import an uploaded drawing; the reader is chosen from `name`
    pub async fn import_bytes(
        &self,
        project_id: ProjectId,
        name: &str,
        bytes: &[u8],
    ) -> Result<ImportReport> {
        let drawing = self.formats.parse(name, bytes)?;
        self.import_drawing(project_id, &drawing, &CancelFlag::new()).await
    }

    /// First import of a parsed drawing
    ///
    /// Handles that already have an active link are reconciled instead of
    /// duplicated, so importing the same drawing twice is harmless. No
    /// deletion sweep runs.
    pub async fn import_drawing(
        &self,
        project_id: ProjectId,
        drawing: &ParsedDrawing,
        cancel: &CancelFlag,
    ) -> Result<ImportReport> {
        let context = self.load_context(project_id).await?;
        let preparer = EntityPreparer::new(&context.project, &context.classifier, &self.config);
        let drawing_id = drawing.drawing_id.as_deref();
        let mut report = ImportReport::new(project_id, &drawing.source_name, drawing.total_parsed());

        tracing::info!(
            project_id = %project_id,
            source = %drawing.source_name,
            entities = drawing.entities.len(),
            "Starting import"
        );

        for issue in &drawing.issues {
            report.record_error(parse_issue_error(issue));
        }

        let mut handles: HashSet<&str> = HashSet::new();
        for entity in &drawing.entities {
            if cancel.is_cancelled() {
                report.cancelled = true;
                tracing::warn!(project_id = %project_id, "Import cancelled");
                break;
            }
            if !handles.insert(entity.handle.as_str()) {
                report.record_error(duplicate_handle_error(entity));
                continue;
            }

            match self.process_entity(&preparer, entity, drawing_id).await? {
                Ok(status) => report.record(outcome(entity, status)),
                Err(error) => report.record_error(error),
            }
        }

        tracing::info!(
            project_id = %project_id,
            specific = report.specific,
            generic = report.generic,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Import finished"
        );
        Ok(report)
    }

    /// Run the pure import stage without writing anything
    ///
    /// Outcomes carry the ids of draft objects that are never stored.
    pub async fn preview_drawing(
        &self,
        project_id: ProjectId,
        drawing: &ParsedDrawing,
    ) -> Result<ImportReport> {
        let context = self.load_context(project_id).await?;
        let preparer = EntityPreparer::new(&context.project, &context.classifier, &self.config);
        let mut report = ImportReport::new(project_id, &drawing.source_name, drawing.total_parsed());

        for issue in &drawing.issues {
            report.record_error(parse_issue_error(issue));
        }
        let mut handles: HashSet<&str> = HashSet::new();
        for entity in &drawing.entities {
            if !handles.insert(entity.handle.as_str()) {
                report.record_error(duplicate_handle_error(entity));
                continue;
            }
            match preparer.prepare(entity) {
                Ok(prepared) => report.record(outcome(entity, prepared.created_status())),
                Err(e) => {
                    let Some(kind) = e.entity_error_kind() else {
                        return Err(e);
                    };
                    report.record_error(EntityError {
                        handle: entity.handle.clone(),
                        layer: entity.layer.clone(),
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Read a drawing from disk and reconcile it with the project
    pub async fn reimport(&self, project_id: ProjectId, path: &Path) -> Result<ReimportReport> {
        let drawing = self.formats.read(path).await?;
        self.reimport_drawing(project_id, &drawing, ReimportScope::Project, &CancelFlag::new())
            .await
    }

    /// Reconcile a parsed drawing with the stored links
    ///
    /// Handles absent from the drawing are swept as deleted once every entity
    /// has been processed. A cancelled run leaves absent handles alone.
    pub async fn reimport_drawing(
        &self,
        project_id: ProjectId,
        drawing: &ParsedDrawing,
        scope: ReimportScope,
        cancel: &CancelFlag,
    ) -> Result<ReimportReport> {
        let drawing_scope = match scope {
            ReimportScope::Project => None,
            ReimportScope::Drawing => Some(drawing.drawing_id.as_deref().ok_or_else(|| {
                CadSyncError::ConfigInvalid {
                    key: "drawing_id".to_string(),
                    reason: "drawing-scoped reimport needs a drawing id".to_string(),
                }
            })?),
        };

        let context = self.load_context(project_id).await?;
        let preparer = EntityPreparer::new(&context.project, &context.classifier, &self.config);
        let drawing_id = drawing.drawing_id.as_deref();
        let mut report =
            ReimportReport::new(project_id, &drawing.source_name, drawing.total_parsed());

        // Phase 1: lookup of links that may be swept
        let lookup = LinkRegistry::new(self.store.as_ref())
            .active_links(project_id, drawing_scope)
            .await?;

        tracing::info!(
            project_id = %project_id,
            source = %drawing.source_name,
            entities = drawing.entities.len(),
            known_links = lookup.len(),
            scope = ?scope,
            "Starting reimport"
        );

        // Skipped entities still count as present
        let mut seen: HashSet<&str> = HashSet::new();
        for issue in &drawing.issues {
            seen.insert(issue.handle.as_str());
            report.record_error(parse_issue_error(issue));
        }

        // Phase 2: reconcile every entity in parse order
        let mut handles: HashSet<&str> = HashSet::new();
        for entity in &drawing.entities {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            seen.insert(entity.handle.as_str());
            if !handles.insert(entity.handle.as_str()) {
                report.record_error(duplicate_handle_error(entity));
                continue;
            }

            match self.process_entity(&preparer, entity, drawing_id).await? {
                Ok(status) => report.record(outcome(entity, status)),
                Err(error) => report.record_error(error),
            }
        }

        // Phase 3: deletion sweep
        if report.cancelled {
            tracing::warn!(project_id = %project_id, "Reimport cancelled, deletion sweep skipped");
        } else {
            let mut absent: Vec<&EntityLink> = lookup
                .values()
                .filter(|link| !seen.contains(link.source_handle.as_str()))
                .collect();
            absent.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            for link in absent {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    tracing::warn!(project_id = %project_id, "Reimport cancelled during deletion sweep");
                    break;
                }

                let unit = self.store.begin_unit().await?;
                let result = delete_entity(unit.as_ref(), link).await;
                let object = finish(unit, result).await?;
                report.record(EntityOutcome {
                    handle: link.source_handle.clone(),
                    layer: link.source_layer.clone(),
                    status: EntityStatus::Deleted { object },
                });
            }
        }

        tracing::info!(
            project_id = %project_id,
            new = report.new,
            modified = report.modified,
            deleted = report.deleted,
            unchanged = report.unchanged,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Reimport finished"
        );
        Ok(report)
    }

    /// Write every live object of a project to a DXF document
    ///
    /// Generic objects that were reclassified are left out; their typed
    /// replacement carries the entity.
    pub async fn export(&self, project_id: ProjectId, config: &ExportConfig) -> Result<ExportedDrawing> {
        let context = self.load_context(project_id).await?;
        let objects = self.store.list_objects(project_id).await?;

        let generator = match &config.layer_mode {
            LayerMode::Canonical => LayerGenerator::canonical(),
            LayerMode::ClientTemplate { template } => LayerGenerator::client_template(
                template.clone(),
                context.rules.iter().flat_map(|rule| rule.aliases.iter()),
            ),
        };
        let transformer = CoordinateTransformer::new(self.config.transform_tolerance)
            .with_georeference(context.project.georeference.clone());

        let exported = export::render(&objects, &generator, &transformer, config)?;

        tracing::info!(
            project_id = %project_id,
            objects = exported.summary.objects_written,
            layers = exported.summary.layers.len(),
            skipped = exported.summary.skipped.len(),
            "Export finished"
        );
        Ok(exported)
    }

    /// Classify a layer name with the project's rules, without writing
    pub async fn classify(&self, project_id: ProjectId, layer: &str) -> Result<ClassificationResult> {
        let context = self.load_context(project_id).await?;
        Ok(context.classifier.classify(layer))
    }

    /// Generic objects awaiting review
    pub async fn review_queue(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        self.load_context(project_id).await?;
        Ok(self
            .store
            .list_objects(project_id)
            .await?
            .into_iter()
            .filter(|object| {
                object
                    .attributes
                    .as_generic()
                    .is_some_and(|g| g.needs_review && g.review_status == ReviewStatus::Pending)
            })
            .collect())
    }

    /// Approve or ignore a pending generic object
    pub async fn review(
        &self,
        project_id: ProjectId,
        object_id: ObjectId,
        decision: ReviewDecision,
    ) -> Result<CanonicalObject> {
        self.load_context(project_id).await?;
        let mut object = self.generic_object(project_id, object_id).await?;

        let Some(generic) = object.attributes.as_generic_mut() else {
            return Err(CadSyncError::ObjectNotFound(object_id));
        };
        if generic.review_status != ReviewStatus::Pending {
            return Err(CadSyncError::InvalidReview {
                object_id,
                reason: format!("object is already {}", generic.review_status.as_str()),
            });
        }
        generic.review_status = decision.status();
        generic.needs_review = false;
        object.updated_at = Utc::now();

        self.store.update_object(&object).await?;
        tracing::info!(
            project_id = %project_id,
            object_id = %object_id,
            decision = ?decision,
            "Generic object reviewed"
        );
        Ok(object)
    }

    /// Promote a generic object to the kind a target layer name describes
    ///
    /// The new object takes over the generic object's geometry and its link.
    /// The generic object stays behind as a `reclassified` record.
    pub async fn reclassify(
        &self,
        project_id: ProjectId,
        object_id: ObjectId,
        target_layer: &str,
    ) -> Result<Reclassification> {
        let context = self.load_context(project_id).await?;
        let mut generic_object = self.generic_object(project_id, object_id).await?;
        if generic_object.is_deleted() {
            return Err(CadSyncError::InvalidReview {
                object_id,
                reason: "object was deleted from the drawing".to_string(),
            });
        }
        if let Some(generic) = generic_object.attributes.as_generic() {
            if generic.review_status.is_terminal() {
                return Err(CadSyncError::InvalidReview {
                    object_id,
                    reason: "object was already reclassified".to_string(),
                });
            }
        }

        let classification = context.classifier.classify(target_layer);
        let kind = resolved_kind(&classification).ok_or_else(|| CadSyncError::InvalidReview {
            object_id,
            reason: format!("layer '{}' does not name an object type", target_layer),
        })?;
        let text = generic_object
            .attributes
            .as_generic()
            .and_then(|g| g.overflow.get("text"))
            .map(String::as_str);
        let attributes = typed_attributes(kind, &classification, &generic_object.geometry, text)
            .ok_or_else(|| CadSyncError::InvalidReview {
                object_id,
                reason: format!(
                    "{:?} geometry cannot carry a {}",
                    generic_object.geometry.geometry_type(),
                    kind
                ),
            })?;

        let mut object = CanonicalObject::new(
            project_id,
            generic_object.geometry.clone(),
            generic_object.crs.clone(),
            attributes,
            classification.confidence,
        );
        object.discipline = classification.discipline.clone();
        object.phase = classification.phase;

        if let Some(generic) = generic_object.attributes.as_generic_mut() {
            generic.review_status = ReviewStatus::Reclassified;
            generic.needs_review = false;
        }
        generic_object.updated_at = Utc::now();

        let previous = generic_object.object_ref();
        let hasher = GeometryHasher::new(self.config.hash_precision);
        let unit = self.store.begin_unit().await?;
        let result = async {
            unit.insert_object(&object).await?;
            unit.update_object(&generic_object).await?;
            relink(unit.as_ref(), &generic_object, &object, &hasher).await
        }
        .await;
        let (link, link_retargeted) = finish(unit, result).await?;

        tracing::info!(
            project_id = %project_id,
            previous = %previous,
            object = %object.object_ref(),
            kind = %kind,
            confidence = classification.confidence,
            "Generic object reclassified"
        );
        Ok(Reclassification { previous, object, link, link_retargeted })
    }

    async fn load_context(&self, project_id: ProjectId) -> Result<ProjectContext> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or(CadSyncError::ProjectNotFound(project_id))?;

        let rules = match &project.client_id {
            Some(client_id) => self.store.list_pattern_rules(client_id).await?,
            None => Vec::new(),
        };
        let classifier = LayerClassifier::with_rules(rules.clone());
        tracing::debug!(
            project_id = %project_id,
            client_id = ?project.client_id,
            rules = classifier.rule_count(),
            "Loaded project context"
        );

        Ok(ProjectContext { project, classifier, rules })
    }

    async fn generic_object(&self, project_id: ProjectId, object_id: ObjectId) -> Result<CanonicalObject> {
        self.store
            .get_object(project_id, ObjectRef::new(ObjectKind::Generic, object_id))
            .await?
            .ok_or(CadSyncError::ObjectNotFound(object_id))
    }

    /// Run the pure stage, then persist with one retry on a link conflict
    ///
    /// The outer `Result` carries operation failures; the inner one carries
    /// the entity error to record.
    async fn process_entity(
        &self,
        preparer: &EntityPreparer<'_>,
        entity: &DrawingEntity,
        drawing_id: Option<&str>,
    ) -> Result<std::result::Result<EntityStatus, EntityError>> {
        let prepared = match preparer.prepare(entity) {
            Ok(prepared) => prepared,
            Err(e) => {
                let Some(kind) = e.entity_error_kind() else {
                    return Err(e);
                };
                tracing::warn!(
                    handle = %entity.handle,
                    layer = %entity.layer,
                    error = %e,
                    "Skipping entity"
                );
                return Ok(Err(EntityError {
                    handle: entity.handle.clone(),
                    layer: entity.layer.clone(),
                    kind,
                    message: e.to_string(),
                }));
            }
        };

        match self.persist(&prepared, drawing_id).await {
            Err(CadSyncError::ConcurrentImportConflict { .. }) => {
                tracing::warn!(
                    handle = %entity.handle,
                    "Concurrent import claimed the handle, retrying against current state"
                );
                // A second conflict ends the operation
                self.persist(&prepared, drawing_id).await.map(Ok)
            }
            other => other.map(Ok),
        }
    }

    async fn persist(&self, prepared: &PreparedEntity, drawing_id: Option<&str>) -> Result<EntityStatus> {
        let unit = self.store.begin_unit().await?;
        let result = apply_entity(unit.as_ref(), prepared, drawing_id).await;
        finish(unit, result).await
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(unit: Box<dyn UnitOfWork>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = unit.rollback().await {
                tracing::error!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Move the link of a reclassified object onto its replacement
///
/// The handle comes from the active link still pointing at the generic
/// object, or from the handle recorded on it when that link is gone.
async fn relink<U: UnitOfWork + ?Sized>(
    unit: &U,
    generic_object: &CanonicalObject,
    object: &CanonicalObject,
    hasher: &GeometryHasher,
) -> Result<(Option<EntityLink>, bool)> {
    let registry = LinkRegistry::new(unit);
    let project_id = object.project_id;
    let previous = generic_object.object_ref();
    let Some(generic) = generic_object.attributes.as_generic() else {
        return Err(CadSyncError::ObjectNotFound(previous.id));
    };

    let linked = registry.find_by_object(project_id, previous).await?;
    let handle = match (&linked, &generic.source_handle) {
        (Some(link), _) => link.source_handle.clone(),
        (None, Some(handle)) => handle.clone(),
        (None, None) => {
            tracing::warn!(object = %previous, "Reclassified object has no link and no recorded handle");
            return Ok((None, false));
        }
    };
    if linked.is_none() {
        if let Some(active) = registry.find(project_id, &handle).await? {
            return Err(CadSyncError::InvalidReview {
                object_id: previous.id,
                reason: format!("handle {} is now linked to {}", handle, active.object_ref),
            });
        }
    }

    match registry.retarget(project_id, &handle, object.object_ref()).await {
        Ok(link) => Ok((Some(link), true)),
        Err(CadSyncError::LinkNotFound { .. }) => {
            tracing::warn!(
                handle = %handle,
                object = %object.object_ref(),
                "No active link to retarget, creating one"
            );
            let upsert = LinkUpsert {
                project_id,
                drawing_id: linked.and_then(|link| link.drawing_id),
                source_handle: handle,
                source_layer: generic.original_layer.clone(),
                source_kind: generic.original_entity_kind.clone(),
                geometry_hash: hasher.hash(&object.geometry),
                object_ref: object.object_ref(),
            };
            registry.upsert_link(upsert).await.map(|link| (Some(link), false))
        }
        Err(e) => Err(e),
    }
}

fn outcome(entity: &DrawingEntity, status: EntityStatus) -> EntityOutcome {
    EntityOutcome { handle: entity.handle.clone(), layer: entity.layer.clone(), status }
}

/// The first entity carrying a handle owns it; later ones are skipped
fn duplicate_handle_error(entity: &DrawingEntity) -> EntityError {
    tracing::warn!(handle = %entity.handle, layer = %entity.layer, "Skipping entity with duplicate handle");
    EntityError {
        handle: entity.handle.clone(),
        layer: entity.layer.clone(),
        kind: EntityErrorKind::Parse,
        message: format!("duplicate handle {} in drawing", entity.handle),
    }
}

fn parse_issue_error(issue: &ParseIssue) -> EntityError {
    tracing::warn!(handle = %issue.handle, layer = %issue.layer, reason = %issue.reason, "Skipping entity");
    EntityError {
        handle: issue.handle.clone(),
        layer: issue.layer.clone(),
        kind: EntityErrorKind::Parse,
        message: issue.reason.clone(),
    }
}
