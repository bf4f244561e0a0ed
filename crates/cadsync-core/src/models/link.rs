//! Entity links between drawing handles and canonical objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::drawing::EntityKind;
use super::object::{ObjectRef, SyncState};
use super::project::ProjectId;

/// Unique identifier for an entity link row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mapping from a source file handle to the canonical object it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    pub id: LinkId,
    pub project_id: ProjectId,
    /// External file identity, only set in drawing-scoped mode
    pub drawing_id: Option<String>,
    pub source_handle: String,
    pub source_layer: String,
    pub source_kind: EntityKind,
    pub geometry_hash: String,
    pub object_ref: ObjectRef,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl EntityLink {
    pub fn is_deleted(&self) -> bool {
        self.sync_state.is_deleted()
    }
}

/// Fields written by `upsert_link`
#[derive(Debug, Clone, PartialEq)]
pub struct LinkUpsert {
    pub project_id: ProjectId,
    pub drawing_id: Option<String>,
    pub source_handle: String,
    pub source_layer: String,
    pub source_kind: EntityKind,
    pub geometry_hash: String,
    pub object_ref: ObjectRef,
}

impl LinkUpsert {
    /// Build the row for a first encounter of this handle
    pub fn into_new_link(self) -> EntityLink {
        let now = Utc::now();
        EntityLink {
            id: LinkId::new(),
            project_id: self.project_id,
            drawing_id: self.drawing_id,
            source_handle: self.source_handle,
            source_layer: self.source_layer,
            source_kind: self.source_kind,
            geometry_hash: self.geometry_hash,
            object_ref: self.object_ref,
            sync_state: SyncState::Active,
            created_at: now,
            last_seen: now,
        }
    }

    /// Apply the upsert onto an existing link
    pub fn apply_to(&self, link: &mut EntityLink) {
        link.source_layer = self.source_layer.clone();
        link.source_kind = self.source_kind.clone();
        link.geometry_hash = self.geometry_hash.clone();
        link.object_ref = self.object_ref;
        if self.drawing_id.is_some() {
            link.drawing_id = self.drawing_id.clone();
        }
        link.sync_state = SyncState::Active;
        link.last_seen = Utc::now();
    }
}
