//! Reconciliation of a prepared entity against the existing link registry

use cadsync_core::error::Result;
use cadsync_core::models::{EntityLink, EntityStatus, ObjectRef, SyncState};
use cadsync_store::UnitOfWork;
use chrono::Utc;

use crate::import::{create_object, PreparedEntity};
use crate::objects::replace_geometry;
use crate::registry::LinkRegistry;

/// Create, update or confirm the object behind one handle
///
/// The link is read inside the unit so a retry after a conflict sees the
/// state left by the competing import.
pub async fn apply_entity<U: UnitOfWork + ?Sized>(
    unit: &U,
    prepared: &PreparedEntity,
    drawing_id: Option<&str>,
) -> Result<EntityStatus> {
    let registry = LinkRegistry::new(unit);
    let project_id = prepared.draft.project_id;

    let Some(link) = registry.find(project_id, &prepared.handle).await? else {
        return create_object(unit, prepared, drawing_id).await;
    };

    let mut object = match unit.get_object(project_id, link.object_ref).await? {
        Some(object) if !object.is_deleted() => object,
        _ => {
            tracing::warn!(
                handle = %prepared.handle,
                object = %link.object_ref,
                "Linked object is missing, recreating it"
            );
            return create_object(unit, prepared, drawing_id).await;
        }
    };

    // No object write: a pending `Modified` flag is left for its consumer
    if link.geometry_hash == prepared.geometry_hash {
        registry.upsert_link(prepared.link_upsert(drawing_id, &object)).await?;
        return Ok(EntityStatus::Unchanged { object: object.object_ref() });
    }

    replace_geometry(&mut object, prepared.draft.geometry.clone());
    object.sync_state = SyncState::Modified;
    object.updated_at = Utc::now();
    unit.update_object(&object).await?;
    registry.upsert_link(prepared.link_upsert(drawing_id, &object)).await?;

    tracing::debug!(
        handle = %prepared.handle,
        object = %object.object_ref(),
        "Geometry changed"
    );
    Ok(EntityStatus::Modified { object: object.object_ref() })
}

/// Soft-delete a link whose handle no longer appears, and its object
pub async fn delete_entity<U: UnitOfWork + ?Sized>(unit: &U, link: &EntityLink) -> Result<ObjectRef> {
    LinkRegistry::new(unit)
        .mark_deleted(link.project_id, &link.source_handle)
        .await?;

    if let Some(mut object) = unit.get_object(link.project_id, link.object_ref).await? {
        if !object.is_deleted() {
            object.sync_state = SyncState::Deleted;
            object.updated_at = Utc::now();
            unit.update_object(&object).await?;
        }
    }

    tracing::debug!(handle = %link.source_handle, object = %link.object_ref, "Entity removed");
    Ok(link.object_ref)
}
