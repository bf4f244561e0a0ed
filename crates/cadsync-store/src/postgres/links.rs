//! Entity link queries

use async_trait::async_trait;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{
    EntityKind, EntityLink, LinkId, ObjectId, ObjectKind, ObjectRef, ProjectId, SyncState,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use super::{storage_error, PostgresStore};
use crate::ports::LinkStore;

const LINK_COLUMNS: &str = "id, project_id, drawing_id, source_handle, source_layer, source_kind, \
     geometry_hash, object_kind, object_id, sync_state::text AS sync_state, created_at, last_seen";

pub(crate) async fn insert(conn: &mut PgConnection, link: &EntityLink) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO entity_links (
            id, project_id, drawing_id, source_handle, source_layer, source_kind,
            geometry_hash, object_kind, object_id, sync_state, created_at, last_seen
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::sync_state, $11, $12)
        "#,
    )
    .bind(link.id.0)
    .bind(link.project_id.0)
    .bind(link.drawing_id.as_deref())
    .bind(&link.source_handle)
    .bind(&link.source_layer)
    .bind(link.source_kind.as_str())
    .bind(&link.geometry_hash)
    .bind(link.object_ref.kind.as_str())
    .bind(link.object_ref.id.0)
    .bind(link.sync_state.as_str())
    .bind(link.created_at)
    .bind(link.last_seen)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CadSyncError::ConcurrentImportConflict {
                project_id: link.project_id,
                handle: link.source_handle.clone(),
            }
        }
        other => storage_error("Failed to insert entity link", other),
    })?;

    Ok(())
}

pub(crate) async fn update(conn: &mut PgConnection, link: &EntityLink) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE entity_links
        SET drawing_id = $3,
            source_layer = $4,
            source_kind = $5,
            geometry_hash = $6,
            object_kind = $7,
            object_id = $8,
            sync_state = $9::sync_state,
            last_seen = $10
        WHERE id = $1 AND project_id = $2
        "#,
    )
    .bind(link.id.0)
    .bind(link.project_id.0)
    .bind(link.drawing_id.as_deref())
    .bind(&link.source_layer)
    .bind(link.source_kind.as_str())
    .bind(&link.geometry_hash)
    .bind(link.object_ref.kind.as_str())
    .bind(link.object_ref.id.0)
    .bind(link.sync_state.as_str())
    .bind(link.last_seen)
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        // Reviving a deleted link while another live link holds the handle
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CadSyncError::ConcurrentImportConflict {
                project_id: link.project_id,
                handle: link.source_handle.clone(),
            }
        }
        other => storage_error("Failed to update entity link", other),
    })?;

    if result.rows_affected() == 0 {
        return Err(CadSyncError::LinkNotFound {
            project_id: link.project_id,
            handle: link.source_handle.clone(),
        });
    }
    Ok(())
}

pub(crate) async fn find(
    conn: &mut PgConnection,
    project_id: ProjectId,
    handle: &str,
) -> Result<Option<EntityLink>> {
    let sql = format!(
        "SELECT {} FROM entity_links \
         WHERE project_id = $1 AND source_handle = $2 AND sync_state <> 'deleted'",
        LINK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(project_id.0)
        .bind(handle)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| storage_error("Failed to find entity link", e))?;

    row.as_ref().map(link_from_row).transpose()
}

pub(crate) async fn find_by_object(
    conn: &mut PgConnection,
    project_id: ProjectId,
    object: ObjectRef,
) -> Result<Option<EntityLink>> {
    let sql = format!(
        "SELECT {} FROM entity_links \
         WHERE project_id = $1 AND object_kind = $2 AND object_id = $3 \
           AND sync_state <> 'deleted'",
        LINK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(project_id.0)
        .bind(object.kind.as_str())
        .bind(object.id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| storage_error("Failed to find entity link by object", e))?;

    row.as_ref().map(link_from_row).transpose()
}

pub(crate) async fn list(
    conn: &mut PgConnection,
    project_id: ProjectId,
    drawing_id: Option<&str>,
) -> Result<Vec<EntityLink>> {
    let sql = format!(
        "SELECT {} FROM entity_links \
         WHERE project_id = $1 AND sync_state <> 'deleted' \
           AND ($2::text IS NULL OR drawing_id = $2) \
         ORDER BY created_at",
        LINK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(project_id.0)
        .bind(drawing_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| storage_error("Failed to list entity links", e))?;

    rows.iter().map(link_from_row).collect()
}

fn link_from_row(row: &PgRow) -> Result<EntityLink> {
    let decode = |e: sqlx::Error| storage_error("Failed to decode entity link", e);

    let object_kind: String = row.try_get("object_kind").map_err(decode)?;
    let object_kind = ObjectKind::parse(&object_kind).ok_or_else(|| {
        CadSyncError::Storage(format!("Unknown object kind '{}' in entity_links", object_kind))
    })?;
    let sync_state: String = row.try_get("sync_state").map_err(decode)?;
    let sync_state = SyncState::parse(&sync_state).ok_or_else(|| {
        CadSyncError::Storage(format!("Unknown sync state '{}' in entity_links", sync_state))
    })?;
    let source_kind: String = row.try_get("source_kind").map_err(decode)?;

    Ok(EntityLink {
        id: LinkId(row.try_get("id").map_err(decode)?),
        project_id: ProjectId(row.try_get("project_id").map_err(decode)?),
        drawing_id: row.try_get("drawing_id").map_err(decode)?,
        source_handle: row.try_get("source_handle").map_err(decode)?,
        source_layer: row.try_get("source_layer").map_err(decode)?,
        source_kind: EntityKind::parse(&source_kind),
        geometry_hash: row.try_get("geometry_hash").map_err(decode)?,
        object_ref: ObjectRef::new(object_kind, ObjectId(row.try_get("object_id").map_err(decode)?)),
        sync_state,
        created_at: row.try_get("created_at").map_err(decode)?,
        last_seen: row.try_get("last_seen").map_err(decode)?,
    })
}

#[async_trait]
impl LinkStore for PostgresStore {
    async fn insert_link(&self, link: &EntityLink) -> Result<()> {
        let mut conn = self.acquire().await?;
        insert(&mut conn, link).await
    }

    async fn update_link(&self, link: &EntityLink) -> Result<()> {
        let mut conn = self.acquire().await?;
        update(&mut conn, link).await
    }

    async fn find_link(&self, project_id: ProjectId, handle: &str) -> Result<Option<EntityLink>> {
        let mut conn = self.acquire().await?;
        find(&mut conn, project_id, handle).await
    }

    async fn find_link_by_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<EntityLink>> {
        let mut conn = self.acquire().await?;
        find_by_object(&mut conn, project_id, object).await
    }

    async fn list_links(
        &self,
        project_id: ProjectId,
        drawing_id: Option<&str>,
    ) -> Result<Vec<EntityLink>> {
        let mut conn = self.acquire().await?;
        list(&mut conn, project_id, drawing_id).await
    }
}
