use super::parse_project;
use crate::cli::ExportArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use cadsync_core::models::Crs;
use cadsync_engine::{ExportConfig, SyncEngine};
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ExportArgs,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;

    let mut config = ExportConfig::from(engine.config());
    if let Some(template) = args.template {
        config = config.with_template(template);
    }
    if let Some(srid) = args.target_srid {
        config = config.with_target_crs(Crs::epsg(srid));
    }

    let exported = engine.export(project_id, &config).await.context("Export failed")?;
    let summary = &exported.summary;

    output.section("Export");
    output.kv("Objects written", summary.objects_written);
    output.kv("Layers", summary.layers.join(", "));
    for skip in &summary.skipped {
        output.warning(format!("Skipped {}: {}", skip.object, skip.reason));
    }

    if dry_run {
        output.info(format!(
            "Dry run: would write {} bytes to {}",
            exported.bytes.len(),
            args.output.display()
        ));
    } else {
        if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&args.output, &exported.bytes)
            .await
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        output.success(format!("Wrote {}", args.output.display()));
    }

    output.result(serde_json::json!({
        "output": args.output,
        "dry_run": dry_run,
        "summary": summary,
    }))
}
