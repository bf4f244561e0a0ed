use async_trait::async_trait;
use cadsync_core::error::Result;
use cadsync_core::models::{
    CanonicalObject, EntityLink, ObjectRef, PatternRule, Project, ProjectId,
};

/// Port for entity link persistence
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert a new link
    ///
    /// Fails with `ConcurrentImportConflict` when a non-deleted link already
    /// exists for the same project and source handle.
    async fn insert_link(&self, link: &EntityLink) -> Result<()>;

    /// Overwrite an existing link row, matched by id
    async fn update_link(&self, link: &EntityLink) -> Result<()>;

    /// Non-deleted link for a handle
    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>>;

    /// Non-deleted link pointing at an object
    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>>;

    /// Non-deleted links for a project, optionally narrowed to one drawing
    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>>;
}

/// Port for canonical object persistence
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()>;

    /// Fetch an object, including soft-deleted ones
    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>>;

    /// Overwrite an existing object, matched by id
    async fn update_object(&self, object: &CanonicalObject) -> Result<()>;

    /// Non-deleted objects of every kind
    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>>;
}

/// Read-only access to collaborator-owned reference data
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// Active rules for a client, ordered by ascending priority
    async fn list_pattern_rules(&self, client_id: &str) -> Result<Vec<PatternRule>>;
}

/// Write side of reference data, used by operational tooling only
#[async_trait]
pub trait ReferenceSeed: Send + Sync {
    async fn put_project(&self, project: &Project) -> Result<()>;

    async fn put_pattern_rule(&self, rule: &PatternRule) -> Result<()>;
}

/// Writes that commit or roll back together
#[async_trait]
pub trait UnitOfWork: LinkStore + ObjectStore {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Stores that can open a unit of work
#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin_unit(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Everything the sync engine needs from a backend
pub trait CadStore: LinkStore + ObjectStore + ReferenceStore + Transactional {}

impl<T> CadStore for T where T: LinkStore + ObjectStore + ReferenceStore + Transactional {}
