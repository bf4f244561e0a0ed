//! Concurrent-import conflicts injected through a wrapping store

use async_trait::async_trait;
use cadsync_core::config::SyncConfig;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{
    CanonicalObject, DrawingEntity, EntityKind, EntityLink, EntityStatus, Geometry, LinkId,
    ObjectRef, ParsedDrawing, PatternRule, Project, ProjectId,
};
use cadsync_engine::{CancelFlag, SyncEngine};
use cadsync_store::{
    LinkStore, MemoryStore, ObjectStore, ReferenceSeed, ReferenceStore, Transactional, UnitOfWork,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fails the next `conflicts` link inserts. With `claim` set, each failure
/// first writes a rival link for the handle, as a competing import would.
struct ConflictingStore {
    inner: MemoryStore,
    conflicts: Arc<AtomicUsize>,
    claim: bool,
}

impl ConflictingStore {
    fn new(inner: MemoryStore, conflicts: usize, claim: bool) -> Self {
        Self { inner, conflicts: Arc::new(AtomicUsize::new(conflicts)), claim }
    }
}

#[async_trait]
impl LinkStore for ConflictingStore {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        self.inner.insert_link(link).await
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        self.inner.update_link(link).await
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        self.inner.find_link(project_id, handle).await
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        self.inner.find_link_by_object(project_id, object).await
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        self.inner.list_links(project_id, drawing_id).await
    }
}

#[async_trait]
impl ObjectStore for ConflictingStore {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        self.inner.insert_object(object).await
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        self.inner.get_object(project_id, object).await
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        self.inner.update_object(object).await
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        self.inner.list_objects(project_id).await
    }
}

#[async_trait]
impl ReferenceStore for ConflictingStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        self.inner.get_project(id).await
    }

    async fn list_pattern_rules(&self, client_id: &str) -> Result<Vec<PatternRule>> {
        self.inner.list_pattern_rules(client_id).await
    }
}

#[async_trait]
impl Transactional for ConflictingStore {
    async fn begin_unit(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(ConflictingUnit {
            unit: self.inner.begin_unit().await?,
            store: self.inner.clone(),
            conflicts: self.conflicts.clone(),
            claim: self.claim,
        }))
    }
}

struct ConflictingUnit {
    unit: Box<dyn UnitOfWork>,
    store: MemoryStore,
    conflicts: Arc<AtomicUsize>,
    claim: bool,
}

#[async_trait]
impl LinkStore for ConflictingUnit {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        let inject = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            if self.claim {
                let mut rival = link.clone();
                rival.id = LinkId::new();
                self.store.insert_link(&rival).await?;
            }
            return Err(CadSyncError::ConcurrentImportConflict {
                project_id: link.project_id,
                handle: link.source_handle.clone(),
            });
        }
        self.unit.insert_link(link).await
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        self.unit.update_link(link).await
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        self.unit.find_link(project_id, handle).await
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        self.unit.find_link_by_object(project_id, object).await
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        self.unit.list_links(project_id, drawing_id).await
    }
}

#[async_trait]
impl ObjectStore for ConflictingUnit {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        self.unit.insert_object(object).await
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        self.unit.get_object(project_id, object).await
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        self.unit.update_object(object).await
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        self.unit.list_objects(project_id).await
    }
}

#[async_trait]
impl UnitOfWork for ConflictingUnit {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.unit.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.unit.rollback().await
    }
}

fn storm_drawing() -> ParsedDrawing {
    ParsedDrawing::new(
        "c101.dxf",
        vec![DrawingEntity::new(
            "1F",
            "CIV-UTIL-STORM-12IN-NEW-LN",
            EntityKind::Line,
            Geometry::line([0.0, 0.0, 0.0], [100.0, 0.0, 0.0]),
        )],
    )
}

async fn setup(conflicts: usize, claim: bool) -> (SyncEngine<ConflictingStore>, MemoryStore, Project) {
    let inner = MemoryStore::new();
    let project = Project::new("Harbor Blvd");
    inner.put_project(&project).await.unwrap();
    let store = Arc::new(ConflictingStore::new(inner.clone(), conflicts, claim));
    (SyncEngine::new(store, SyncConfig::default()), inner, project)
}

#[tokio::test]
async fn test_conflict_is_retried_against_current_state() {
    let (engine, inner, project) = setup(1, true).await;

    let report = engine
        .import_drawing(project.id, &storm_drawing(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(report.specific, 1);
    let object = match report.entities[0].status {
        EntityStatus::Specific { object, .. } => object,
        ref other => panic!("expected specific, got {:?}", other),
    };

    // The rival link was adopted and now points at the surviving object
    let links = inner.all_links(project.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].object_ref, object);
    assert_eq!(inner.list_objects(project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_persistent_conflict_fails_the_operation() {
    let (engine, inner, project) = setup(2, false).await;

    let err = engine
        .import_drawing(project.id, &storm_drawing(), &CancelFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CadSyncError::ConcurrentImportConflict { .. }));
    // Both attempts rolled back
    assert!(inner.list_objects(project.id).await.unwrap().is_empty());
    assert!(inner.all_links(project.id).unwrap().is_empty());
}
