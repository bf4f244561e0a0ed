use crate::cli::{DbArgs, DbCommand};
use crate::output::OutputWriter;
use crate::output_types::MigrationRow;
use anyhow::{Context, Result};
use cadsync_store::postgres::{PostgresConfig, PostgresStore};

/// Execute database management commands
pub async fn execute(args: &DbArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let config = PostgresConfig::from_env()
        .context("Failed to load database configuration. Ensure DATABASE_URL is set.")?;
    let store = PostgresStore::new(config).await.context("Failed to connect to database")?;

    match args.command {
        DbCommand::Migrate => execute_migrate(&store, output, dry_run).await,
        DbCommand::Status => execute_status(&store, output).await,
    }
}

async fn execute_migrate(store: &PostgresStore, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let pending: Vec<_> = store
        .migration_status()
        .await
        .context("Failed to read migration status")?
        .into_iter()
        .filter(|m| !m.applied)
        .collect();

    if pending.is_empty() {
        output.success("Database schema is up to date");
        return output.result(serde_json::json!({ "applied": 0 }));
    }

    if dry_run {
        output.info(format!("Dry run: would apply {} migration(s)", pending.len()));
        for migration in &pending {
            output.info(format!("  - {} {}", migration.version, migration.description));
        }
        return output.result(serde_json::json!({ "dry_run": true, "pending": pending }));
    }

    store.run_migrations().await.context("Failed to run migrations")?;
    output.success(format!("Applied {} migration(s)", pending.len()));
    output.result(serde_json::json!({ "applied": pending.len() }))
}

async fn execute_status(store: &PostgresStore, output: &OutputWriter) -> Result<()> {
    let status = store.migration_status().await.context("Failed to read migration status")?;

    output.section("Migrations");
    output.table(
        status
            .iter()
            .map(|m| MigrationRow {
                version: m.version,
                description: m.description.clone(),
                applied: m.applied,
            })
            .collect(),
    );
    output.result(&status)
}
