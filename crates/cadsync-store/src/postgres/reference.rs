//! Project registry and client pattern rules

use async_trait::async_trait;
use cadsync_core::error::Result;
use cadsync_core::models::{Crs, PatternRule, Project, ProjectId};
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{storage_error, PostgresStore};
use crate::ports::{ReferenceSeed, ReferenceStore};

fn project_from_row(row: &PgRow) -> Result<Project> {
    let decode = |e: sqlx::Error| storage_error("Failed to decode project", e);

    let srid: Option<i32> = row.try_get("georef_srid").map_err(decode)?;
    let georef_name: Option<String> = row.try_get("georef_name").map_err(decode)?;
    let georeference = srid.map(|srid| match georef_name {
        Some(name) => Crs::new(srid.max(0) as u32, name),
        None => Crs::epsg(srid.max(0) as u32),
    });

    Ok(Project {
        id: ProjectId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        client_id: row.try_get("client_id").map_err(decode)?,
        georeference,
    })
}

fn rule_from_row(row: &PgRow) -> Result<PatternRule> {
    let decode = |e: sqlx::Error| storage_error("Failed to decode pattern rule", e);

    let slots: serde_json::Value = row.try_get("slots").map_err(decode)?;
    let defaults: serde_json::Value = row.try_get("defaults").map_err(decode)?;
    let aliases: serde_json::Value = row.try_get("aliases").map_err(decode)?;

    Ok(PatternRule {
        id: row.try_get("id").map_err(decode)?,
        client_id: row.try_get("client_id").map_err(decode)?,
        priority: row.try_get("priority").map_err(decode)?,
        pattern: row.try_get("pattern").map_err(decode)?,
        slots: serde_json::from_value(slots)?,
        defaults: serde_json::from_value(defaults)?,
        aliases: serde_json::from_value(aliases)?,
        confidence: row.try_get("confidence").map_err(decode)?,
        active: row.try_get("active").map_err(decode)?,
    })
}

#[async_trait]
impl ReferenceStore for PostgresStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query(
            "SELECT id, name, client_id, georef_srid, georef_name FROM projects WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| storage_error("Failed to get project", e))?;

        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_pattern_rules(&self, client_id: &str) -> Result<Vec<PatternRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, client_id, priority, pattern, slots, defaults, aliases, confidence, active
            FROM pattern_rules
            WHERE client_id = $1 AND active
            ORDER BY priority, id
            "#,
        )
        .bind(client_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| storage_error("Failed to list pattern rules", e))?;

        rows.iter().map(rule_from_row).collect()
    }
}

#[async_trait]
impl ReferenceSeed for PostgresStore {
    async fn put_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, client_id, georef_srid, georef_name)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                client_id = EXCLUDED.client_id,
                georef_srid = EXCLUDED.georef_srid,
                georef_name = EXCLUDED.georef_name
            "#,
        )
        .bind(project.id.0)
        .bind(&project.name)
        .bind(project.client_id.as_deref())
        .bind(project.georeference.as_ref().map(|crs| crs.srid as i32))
        .bind(project.georeference.as_ref().map(|crs| crs.name.as_str()))
        .execute(self.pool())
        .await
        .map_err(|e| storage_error("Failed to store project", e))?;

        Ok(())
    }

    async fn put_pattern_rule(&self, rule: &PatternRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pattern_rules
                (id, client_id, priority, pattern, slots, defaults, aliases, confidence, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET client_id = EXCLUDED.client_id,
                priority = EXCLUDED.priority,
                pattern = EXCLUDED.pattern,
                slots = EXCLUDED.slots,
                defaults = EXCLUDED.defaults,
                aliases = EXCLUDED.aliases,
                confidence = EXCLUDED.confidence,
                active = EXCLUDED.active
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.client_id)
        .bind(rule.priority)
        .bind(&rule.pattern)
        .bind(serde_json::to_value(&rule.slots)?)
        .bind(serde_json::to_value(&rule.defaults)?)
        .bind(serde_json::to_value(&rule.aliases)?)
        .bind(rule.confidence)
        .bind(rule.active)
        .execute(self.pool())
        .await
        .map_err(|e| storage_error("Failed to store pattern rule", e))?;

        Ok(())
    }
}
