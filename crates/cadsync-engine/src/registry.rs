//! Entity link registry
//!
//! `upsert_link` and `retarget` are the only writers of link identity. Both
//! can be repeated with the same inputs and only move `last_seen`.

use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{EntityLink, LinkUpsert, ObjectRef, ProjectId, SyncState};
use cadsync_store::LinkStore;
use chrono::Utc;
use std::collections::HashMap;

pub struct LinkRegistry<'a, L: LinkStore + ?Sized> {
    store: &'a L,
}

impl<'a, L: LinkStore + ?Sized> LinkRegistry<'a, L> {
    pub fn new(store: &'a L) -> Self {
        Self { store }
    }

    /// Create the link for a handle, or refresh the active one in place
    pub async fn upsert_link(&self, upsert: LinkUpsert) -> Result<EntityLink> {
        match self.store.find_link(upsert.project_id, &upsert.source_handle).await? {
            Some(mut link) => {
                upsert.apply_to(&mut link);
                self.store.update_link(&link).await?;
                Ok(link)
            }
            None => {
                let link = upsert.into_new_link();
                self.store.insert_link(&link).await?;
                Ok(link)
            }
        }
    }

    pub async fn find(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        self.store.find_link(project_id, handle).await
    }

    pub async fn find_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        self.store.find_link_by_object(project_id, object).await
    }

    /// Soft-delete the active link for a handle; the row is kept
    pub async fn mark_deleted(&self, project_id: ProjectId, handle: &str) -> Result<EntityLink> {
        let mut link = self.require(project_id, handle).await?;
        link.sync_state = SyncState::Deleted;
        link.last_seen = Utc::now();
        self.store.update_link(&link).await?;
        Ok(link)
    }

    /// Point the active link for a handle at a different object
    pub async fn retarget(
        &self,
        project_id: ProjectId,
        handle: &str,
        object: ObjectRef,
    ) -> Result<EntityLink> {
        let mut link = self.require(project_id, handle).await?;
        link.object_ref = object;
        link.sync_state = SyncState::Active;
        link.last_seen = Utc::now();
        self.store.update_link(&link).await?;
        Ok(link)
    }

    /// Active links keyed by handle, narrowed to one drawing when given
    pub async fn active_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<HashMap<String, EntityLink>> {
        Ok(self
            .store
            .list_links(project_id, drawing_id)
            .await?
            .into_iter()
            .map(|link| (link.source_handle.clone(), link))
            .collect())
    }

    async fn require(&self, project_id: ProjectId, handle: &str) -> Result<EntityLink> {
        self.store
            .find_link(project_id, handle)
            .await?
            .ok_or_else(|| CadSyncError::LinkNotFound { project_id, handle: handle.to_string() })
    }
}
