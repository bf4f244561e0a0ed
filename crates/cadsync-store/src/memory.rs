//! In-memory storage for development, tests and the file-backed CLI mode.
//!
//! All state lives behind one `RwLock`. Units of work apply their writes
//! immediately and keep an undo log that rollback replays in reverse.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{
    CanonicalObject, EntityLink, LinkId, ObjectId, ObjectRef, PatternRule, Project, ProjectId,
};

use crate::ports::{
    LinkStore, ObjectStore, ReferenceSeed, ReferenceStore, Transactional, UnitOfWork,
};

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<ProjectId, Project>,
    pattern_rules: HashMap<String, PatternRule>,
    objects: HashMap<ObjectId, CanonicalObject>,
    links: HashMap<LinkId, EntityLink>,
}

/// Serialized form of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    pattern_rules: Vec<PatternRule>,
    #[serde(default)]
    objects: Vec<CanonicalObject>,
    #[serde(default)]
    links: Vec<EntityLink>,
}

/// Previous value of a row touched inside a unit of work
#[derive(Debug)]
enum UndoEntry {
    Link(LinkId, Option<EntityLink>),
    Object(ObjectId, Option<CanonicalObject>),
}

impl MemoryState {
    fn insert_link(&mut self, link: &EntityLink) -> Result<()> {
        let duplicate = self.links.values().any(|existing| {
            !existing.is_deleted()
                && existing.project_id == link.project_id
                && existing.source_handle == link.source_handle
        });
        if duplicate && !link.is_deleted() {
            return Err(CadSyncError::ConcurrentImportConflict {
                project_id: link.project_id,
                handle: link.source_handle.clone(),
            });
        }
        self.links.insert(link.id, link.clone());
        Ok(())
    }

    fn update_link(&mut self, link: &EntityLink) -> Result<EntityLink> {
        let previous = self.links.get(&link.id).cloned().ok_or_else(|| {
            CadSyncError::LinkNotFound {
                project_id: link.project_id,
                handle: link.source_handle.clone(),
            }
        })?;
        self.links.insert(link.id, link.clone());
        Ok(previous)
    }

    fn find_link(&self, project_id: ProjectId, handle: &str) -> Option<EntityLink> {
        self.links
            .values()
            .find(|l| !l.is_deleted() && l.project_id == project_id && l.source_handle == handle)
            .cloned()
    }

    fn find_link_by_object(&self, project_id: ProjectId, object: ObjectRef) -> Option<EntityLink> {
        self.links
            .values()
            .find(|l| !l.is_deleted() && l.project_id == project_id && l.object_ref == object)
            .cloned()
    }

    fn list_links(&self, project_id: ProjectId, drawing_id: Option<&str>) -> Vec<EntityLink> {
        let mut links: Vec<EntityLink> = self
            .links
            .values()
            .filter(|l| !l.is_deleted() && l.project_id == project_id)
            .filter(|l| drawing_id.is_none() || l.drawing_id.as_deref() == drawing_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        links
    }

    fn insert_object(&mut self, object: &CanonicalObject) -> Result<()> {
        if self.objects.contains_key(&object.id) {
            return Err(CadSyncError::Storage(format!("Object {} already exists", object.id)));
        }
        self.objects.insert(object.id, object.clone());
        Ok(())
    }

    fn update_object(&mut self, object: &CanonicalObject) -> Result<CanonicalObject> {
        let previous = self
            .objects
            .get(&object.id)
            .cloned()
            .ok_or(CadSyncError::ObjectNotFound(object.id))?;
        self.objects.insert(object.id, object.clone());
        Ok(previous)
    }

    fn get_object(&self, project_id: ProjectId, object: ObjectRef) -> Option<CanonicalObject> {
        self.objects
            .get(&object.id)
            .filter(|o| o.project_id == project_id && o.kind() == object.kind)
            .cloned()
    }

    fn list_objects(&self, project_id: ProjectId) -> Vec<CanonicalObject> {
        let mut objects: Vec<CanonicalObject> = self
            .objects
            .values()
            .filter(|o| !o.is_deleted() && o.project_id == project_id)
            .cloned()
            .collect();
        objects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        objects
    }

    fn undo(&mut self, entry: UndoEntry) {
        match entry {
            UndoEntry::Link(id, Some(previous)) => {
                self.links.insert(id, previous);
            }
            UndoEntry::Link(id, None) => {
                self.links.remove(&id);
            }
            UndoEntry::Object(id, Some(previous)) => {
                self.objects.insert(id, previous);
            }
            UndoEntry::Object(id, None) => {
                self.objects.remove(&id);
            }
        }
    }
}

/// In-memory implementation of every storage port
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryStore::save_snapshot`].
    /// A missing file yields an empty store.
    pub async fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::new());
        }

        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        let state = MemoryState {
            projects: snapshot.projects.into_iter().map(|p| (p.id, p)).collect(),
            pattern_rules: snapshot
                .pattern_rules
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            objects: snapshot.objects.into_iter().map(|o| (o.id, o)).collect(),
            links: snapshot.links.into_iter().map(|l| (l.id, l)).collect(),
        };

        Ok(Self { state: Arc::new(RwLock::new(state)) })
    }

    /// Write the whole store as pretty JSON
    pub async fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = {
            let state = self.read()?;
            let mut snapshot = Snapshot {
                projects: state.projects.values().cloned().collect(),
                pattern_rules: state.pattern_rules.values().cloned().collect(),
                objects: state.objects.values().cloned().collect(),
                links: state.links.values().cloned().collect(),
            };
            snapshot.projects.sort_by(|a, b| a.name.cmp(&b.name));
            snapshot.pattern_rules.sort_by(|a, b| a.id.cmp(&b.id));
            snapshot.objects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            snapshot.links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            serde_json::to_vec_pretty(&snapshot)?
        };

        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Every link row including soft-deleted ones, for inspection
    pub fn all_links(&self, project_id: ProjectId) -> Result<Vec<EntityLink>> {
        let state = self.read()?;
        Ok(state.links.values().filter(|l| l.project_id == project_id).cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| CadSyncError::Storage("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| CadSyncError::Storage("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        self.write()?.insert_link(link)
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        self.write()?.update_link(link).map(|_| ())
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        Ok(self.read()?.find_link(project_id, handle))
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        Ok(self.read()?.find_link_by_object(project_id, object))
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        Ok(self.read()?.list_links(project_id, drawing_id))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        self.write()?.insert_object(object)
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        Ok(self.read()?.get_object(project_id, object))
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        self.write()?.update_object(object).map(|_| ())
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        Ok(self.read()?.list_objects(project_id))
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.read()?.projects.get(&id).cloned())
    }

    async fn list_pattern_rules(&self, client_id: &str) -> Result<Vec<PatternRule>> {
        let state = self.read()?;
        let mut rules: Vec<PatternRule> = state
            .pattern_rules
            .values()
            .filter(|r| r.active && r.client_id == client_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }
}

#[async_trait]
impl ReferenceSeed for MemoryStore {
    async fn put_project(&self, project: &Project) -> Result<()> {
        self.write()?.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn put_pattern_rule(&self, rule: &PatternRule) -> Result<()> {
        self.write()?.pattern_rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    async fn begin_unit(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            undo: Mutex::new(Vec::new()),
            finished: false,
        }))
    }
}

/// Unit of work over [`MemoryStore`]; dropped units roll back
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    undo: Mutex<Vec<UndoEntry>>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn record(&self, entry: UndoEntry) -> Result<()> {
        self.undo
            .lock()
            .map_err(|_| CadSyncError::Storage("undo log lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }

    fn replay_undo(&mut self) -> Result<()> {
        let entries = std::mem::take(
            self.undo
                .get_mut()
                .map_err(|_| CadSyncError::Storage("undo log lock poisoned".to_string()))?,
        );
        let mut state = self.store.write()?;
        for entry in entries.into_iter().rev() {
            state.undo(entry);
        }
        Ok(())
    }
}

#[async_trait]
impl LinkStore for MemoryUnitOfWork {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        self.store.write()?.insert_link(link)?;
        self.record(UndoEntry::Link(link.id, None))
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        let previous = self.store.write()?.update_link(link)?;
        self.record(UndoEntry::Link(link.id, Some(previous)))
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        self.store.find_link(project_id, handle).await
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        self.store.find_link_by_object(project_id, object).await
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        self.store.list_links(project_id, drawing_id).await
    }
}

#[async_trait]
impl ObjectStore for MemoryUnitOfWork {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        self.store.write()?.insert_object(object)?;
        self.record(UndoEntry::Object(object.id, None))
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        self.store.get_object(project_id, object).await
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        let previous = self.store.write()?.update_object(object)?;
        self.record(UndoEntry::Object(object.id, Some(previous)))
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        self.store.list_objects(project_id).await
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.replay_undo()
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.replay_undo() {
                tracing::error!("Failed to roll back abandoned unit of work: {}", e);
            }
        }
    }
}
