//! Canonical object queries, one table per object kind

use async_trait::async_trait;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{
    Alignment, Bmp, CanonicalObject, Crs, EntityKind, GenericObject, Geometry, ObjectAttributes,
    ObjectId, ObjectKind, ObjectRef, Phase, ProjectId, ReviewStatus, SurveyPoint, SyncState,
    UtilityLine, UtilityStructure,
};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres, Row};

use super::{storage_error, PostgresStore};
use crate::ports::ObjectStore;

const COMMON_COLUMNS: [&str; 10] = [
    "id",
    "project_id",
    "geom",
    "crs_name",
    "discipline",
    "phase",
    "quality_score",
    "sync_state",
    "created_at",
    "updated_at",
];

const COMMON_SELECT: &str = "id, project_id, \
     ST_AsGeoJSON(ST_Force3D(geom), 15)::jsonb AS geom_json, ST_SRID(geom) AS srid, \
     crs_name, discipline, phase, quality_score, sync_state::text AS sync_state, \
     created_at, updated_at";

/// Kind-specific columns and the cast applied to their bind parameter
fn kind_columns(kind: ObjectKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ObjectKind::UtilityLine => {
            &[("system", ""), ("diameter_in", ""), ("material", ""), ("length", "")]
        }
        ObjectKind::UtilityStructure => {
            &[("structure_type", ""), ("system", ""), ("rim_elevation", "")]
        }
        ObjectKind::Bmp => &[("bmp_type", ""), ("area", "")],
        ObjectKind::Alignment => &[("alignment_type", ""), ("length", "")],
        ObjectKind::SurveyPoint => &[("point_type", ""), ("elevation", ""), ("description", "")],
        ObjectKind::Generic => &[
            ("original_layer", ""),
            ("original_entity_kind", ""),
            ("confidence", ""),
            ("needs_review", ""),
            ("review_status", "::review_status"),
            ("suggested_object_type", ""),
            ("overflow", ""),
            ("source_handle", ""),
        ],
    }
}

fn select_sql(kind: ObjectKind, filter: &str) -> String {
    let extra: Vec<String> = kind_columns(kind)
        .iter()
        .map(|(column, cast)| {
            if cast.is_empty() {
                column.to_string()
            } else {
                format!("{column}::text AS {column}")
            }
        })
        .collect();
    format!(
        "SELECT {}, {} FROM {} WHERE {}",
        COMMON_SELECT,
        extra.join(", "),
        kind.table(),
        filter
    )
}

fn insert_sql(kind: ObjectKind) -> String {
    let extra = kind_columns(kind);
    let columns: Vec<&str> = COMMON_COLUMNS
        .iter()
        .copied()
        .chain(extra.iter().map(|(column, _)| *column))
        .collect();
    let extra_values: Vec<String> = extra
        .iter()
        .enumerate()
        .map(|(i, (_, cast))| format!("${}{}", i + 12, cast))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ($1, $2, ST_SetSRID(ST_GeomFromGeoJSON($3), $4), \
         $5, $6, $7, $8, $9::sync_state, $10, $11, {})",
        kind.table(),
        columns.join(", "),
        extra_values.join(", ")
    )
}

fn update_sql(kind: ObjectKind) -> String {
    let assignments: Vec<String> = kind_columns(kind)
        .iter()
        .enumerate()
        .map(|(i, (column, cast))| format!("{} = ${}{}", column, i + 12, cast))
        .collect();
    format!(
        "UPDATE {} SET geom = ST_SetSRID(ST_GeomFromGeoJSON($3), $4), crs_name = $5, \
         discipline = $6, phase = $7, quality_score = $8, sync_state = $9::sync_state, \
         created_at = $10, updated_at = $11, {} \
         WHERE id = $1 AND project_id = $2",
        kind.table(),
        assignments.join(", ")
    )
}

/// Bind every column in the order used by [`insert_sql`] and [`update_sql`]
fn bind_object<'q>(
    query: Query<'q, Postgres, PgArguments>,
    object: &'q CanonicalObject,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let geojson = serde_json::to_string(&object.geometry)?;
    let query = query
        .bind(object.id.0)
        .bind(object.project_id.0)
        .bind(geojson)
        .bind(object.crs.srid as i32)
        .bind(&object.crs.name)
        .bind(object.discipline.as_deref())
        .bind(object.phase.map(|p| p.as_str()))
        .bind(object.quality_score)
        .bind(object.sync_state.as_str())
        .bind(object.created_at)
        .bind(object.updated_at);

    Ok(match &object.attributes {
        ObjectAttributes::UtilityLine(a) => query
            .bind(&a.system)
            .bind(a.diameter_in)
            .bind(a.material.as_deref())
            .bind(a.length),
        ObjectAttributes::UtilityStructure(a) => query
            .bind(&a.structure_type)
            .bind(a.system.as_deref())
            .bind(a.rim_elevation),
        ObjectAttributes::Bmp(a) => query.bind(&a.bmp_type).bind(a.area),
        ObjectAttributes::Alignment(a) => query.bind(&a.alignment_type).bind(a.length),
        ObjectAttributes::SurveyPoint(a) => query
            .bind(&a.point_type)
            .bind(a.elevation)
            .bind(a.description.as_deref()),
        ObjectAttributes::Generic(g) => query
            .bind(&g.original_layer)
            .bind(g.original_entity_kind.as_str())
            .bind(g.confidence)
            .bind(g.needs_review)
            .bind(g.review_status.as_str())
            .bind(g.suggested_object_type.as_deref())
            .bind(serde_json::to_value(&g.overflow)?)
            .bind(g.source_handle.as_deref()),
    })
}

pub(crate) async fn insert(conn: &mut PgConnection, object: &CanonicalObject) -> Result<()> {
    let sql = insert_sql(object.kind());
    bind_object(sqlx::query(&sql), object)?
        .execute(&mut *conn)
        .await
        .map_err(|e| storage_error(&format!("Failed to insert {}", object.kind()), e))?;
    Ok(())
}

pub(crate) async fn update(conn: &mut PgConnection, object: &CanonicalObject) -> Result<()> {
    let sql = update_sql(object.kind());
    let result = bind_object(sqlx::query(&sql), object)?
        .execute(&mut *conn)
        .await
        .map_err(|e| storage_error(&format!("Failed to update {}", object.kind()), e))?;

    if result.rows_affected() == 0 {
        return Err(CadSyncError::ObjectNotFound(object.id));
    }
    Ok(())
}

pub(crate) async fn get(
    conn: &mut PgConnection,
    project_id: ProjectId,
    object: ObjectRef,
) -> Result<Option<CanonicalObject>> {
    let sql = select_sql(object.kind, "id = $1 AND project_id = $2");
    let row = sqlx::query(&sql)
        .bind(object.id.0)
        .bind(project_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| storage_error(&format!("Failed to get {}", object.kind), e))?;

    row.map(|row| object_from_row(object.kind, &row)).transpose()
}

pub(crate) async fn list(
    conn: &mut PgConnection,
    project_id: ProjectId,
) -> Result<Vec<CanonicalObject>> {
    let mut objects = Vec::new();
    for kind in ObjectKind::ALL {
        let sql = select_sql(
            kind,
            "project_id = $1 AND sync_state <> 'deleted' ORDER BY created_at",
        );
        let rows = sqlx::query(&sql)
            .bind(project_id.0)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| storage_error(&format!("Failed to list {}", kind.table()), e))?;
        for row in &rows {
            objects.push(object_from_row(kind, row)?);
        }
    }
    Ok(objects)
}

fn object_from_row(kind: ObjectKind, row: &PgRow) -> Result<CanonicalObject> {
    let decode = |e: sqlx::Error| storage_error(&format!("Failed to decode {}", kind), e);

    let geom_json: serde_json::Value = row.try_get("geom_json").map_err(decode)?;
    let geometry = Geometry::from_geojson(&geom_json).ok_or_else(|| {
        CadSyncError::Storage(format!("Unsupported geometry stored in {}", kind.table()))
    })?;
    let srid: i32 = row.try_get("srid").map_err(decode)?;
    let crs_name: String = row.try_get("crs_name").map_err(decode)?;
    let phase: Option<String> = row.try_get("phase").map_err(decode)?;
    let sync_state: String = row.try_get("sync_state").map_err(decode)?;
    let sync_state = SyncState::parse(&sync_state).ok_or_else(|| {
        CadSyncError::Storage(format!("Unknown sync state '{}' in {}", sync_state, kind.table()))
    })?;

    let attributes = match kind {
        ObjectKind::UtilityLine => ObjectAttributes::UtilityLine(UtilityLine {
            system: row.try_get("system").map_err(decode)?,
            diameter_in: row.try_get("diameter_in").map_err(decode)?,
            material: row.try_get("material").map_err(decode)?,
            length: row.try_get("length").map_err(decode)?,
        }),
        ObjectKind::UtilityStructure => ObjectAttributes::UtilityStructure(UtilityStructure {
            structure_type: row.try_get("structure_type").map_err(decode)?,
            system: row.try_get("system").map_err(decode)?,
            rim_elevation: row.try_get("rim_elevation").map_err(decode)?,
        }),
        ObjectKind::Bmp => ObjectAttributes::Bmp(Bmp {
            bmp_type: row.try_get("bmp_type").map_err(decode)?,
            area: row.try_get("area").map_err(decode)?,
        }),
        ObjectKind::Alignment => ObjectAttributes::Alignment(Alignment {
            alignment_type: row.try_get("alignment_type").map_err(decode)?,
            length: row.try_get("length").map_err(decode)?,
        }),
        ObjectKind::SurveyPoint => ObjectAttributes::SurveyPoint(SurveyPoint {
            point_type: row.try_get("point_type").map_err(decode)?,
            elevation: row.try_get("elevation").map_err(decode)?,
            description: row.try_get("description").map_err(decode)?,
        }),
        ObjectKind::Generic => {
            let entity_kind: String = row.try_get("original_entity_kind").map_err(decode)?;
            let review_status: String = row.try_get("review_status").map_err(decode)?;
            let overflow: serde_json::Value = row.try_get("overflow").map_err(decode)?;
            ObjectAttributes::Generic(GenericObject {
                original_layer: row.try_get("original_layer").map_err(decode)?,
                original_entity_kind: EntityKind::parse(&entity_kind),
                confidence: row.try_get("confidence").map_err(decode)?,
                needs_review: row.try_get("needs_review").map_err(decode)?,
                review_status: ReviewStatus::parse(&review_status).ok_or_else(|| {
                    CadSyncError::Storage(format!("Unknown review status '{}'", review_status))
                })?,
                suggested_object_type: row.try_get("suggested_object_type").map_err(decode)?,
                overflow: serde_json::from_value(overflow)?,
                source_handle: row.try_get("source_handle").map_err(decode)?,
            })
        }
    };

    Ok(CanonicalObject {
        id: ObjectId(row.try_get("id").map_err(decode)?),
        project_id: ProjectId(row.try_get("project_id").map_err(decode)?),
        geometry,
        crs: Crs::new(srid.max(0) as u32, crs_name),
        discipline: row.try_get("discipline").map_err(decode)?,
        phase: phase.as_deref().and_then(Phase::parse),
        attributes,
        quality_score: row.try_get("quality_score").map_err(decode)?,
        sync_state,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

#[async_trait]
impl ObjectStore for PostgresStore {
    async fn insert_object(&self, object: &CanonicalObject) -> Result<()> {
        let mut conn = self.acquire().await?;
        insert(&mut conn, object).await
    }

    async fn get_object(
        &self,
        project_id: ProjectId,
        object: ObjectRef,
    ) -> Result<Option<CanonicalObject>> {
        let mut conn = self.acquire().await?;
        get(&mut conn, project_id, object).await
    }

    async fn update_object(&self, object: &CanonicalObject) -> Result<()> {
        let mut conn = self.acquire().await?;
        update(&mut conn, object).await
    }

    async fn list_objects(&self, project_id: ProjectId) -> Result<Vec<CanonicalObject>> {
        let mut conn = self.acquire().await?;
        list(&mut conn, project_id).await
    }
}
