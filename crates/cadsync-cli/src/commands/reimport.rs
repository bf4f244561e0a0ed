use super::{cancel_on_interrupt, import, parse_project};
use crate::cli::{ReimportArgs, ScopeArg};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use cadsync_engine::{ReimportScope, SyncEngine};
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ReimportArgs,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;
    let mut drawing = engine
        .formats()
        .read(&args.file)
        .await
        .with_context(|| format!("Failed to read drawing {}", args.file.display()))?;
    if let Some(drawing_id) = args.drawing_id {
        drawing = drawing.with_drawing_id(drawing_id);
    }
    let scope = match args.scope {
        ScopeArg::Project => ReimportScope::Project,
        ScopeArg::Drawing => ReimportScope::Drawing,
    };

    if dry_run {
        // Change detection needs the store; the preview covers parsing and classification
        let report = engine.preview_drawing(project_id, &drawing).await?;
        output.info("Dry run: nothing was written, deletions are not previewed");
        import::render(output, &report);
        return output.result(serde_json::json!({ "dry_run": true, "report": report }));
    }

    let (cancel, interrupt) = cancel_on_interrupt();
    let report = engine.reimport_drawing(project_id, &drawing, scope, &cancel).await;
    interrupt.abort();
    let report = report.context("Reimport failed")?;

    output.section(format!("Reimport of {}", report.source_name));
    output.kv("Entities parsed", report.total_parsed);
    output.kv("New", format!("{} ({} generic)", report.new, report.new_generic));
    output.kv("Modified", report.modified);
    output.kv("Deleted", report.deleted);
    output.kv("Unchanged", report.unchanged);
    output.kv("Skipped", report.skipped);
    import::render_entities(output, &report.entities, &report.errors);

    if !report.geometry_changed.is_empty() {
        output.info(format!(
            "{} object(s) changed geometry and may need downstream recalculation",
            report.geometry_changed.len()
        ));
    }
    if report.cancelled {
        output.warning("Reimport was cancelled; the deletion sweep did not run");
    } else if report.is_noop() {
        output.success("Drawing is already in sync");
    } else {
        output.success("Reimport complete");
    }

    output.result(&report)
}
