use super::{parse_object, parse_project};
use crate::cli::ReclassifyArgs;
use crate::output::OutputWriter;
use crate::output_types::ClassificationRow;
use anyhow::{Context, Result};
use cadsync_engine::SyncEngine;
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ReclassifyArgs,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;
    let object_id = parse_object(&args.object)?;

    if dry_run {
        let result = engine.classify(project_id, &args.layer).await?;
        output.info(format!("Dry run: {} would be reclassified as", object_id));
        output.table(vec![ClassificationRow::new(&args.layer, &result)]);
        return output.result(serde_json::json!({
            "dry_run": true,
            "object_id": object_id,
            "classification": result,
        }));
    }

    let outcome = engine
        .reclassify(project_id, object_id, &args.layer)
        .await
        .with_context(|| format!("Failed to reclassify {}", object_id))?;

    output.success(format!("{} replaced by {}", outcome.previous, outcome.object.object_ref()));
    match &outcome.link {
        Some(link) if outcome.link_retargeted => {
            output.kv("Link", format!("handle {} retargeted", link.source_handle));
        }
        Some(link) => {
            output.warning(format!("Link for handle {} was rewritten", link.source_handle));
        }
        None => output.warning("The generic object had no active link"),
    }

    output.result(&outcome)
}
