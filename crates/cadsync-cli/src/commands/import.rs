use super::{cancel_on_interrupt, parse_project};
use crate::cli::ImportArgs;
use crate::output::OutputWriter;
use crate::output_types::{EntityRow, ErrorRow};
use anyhow::{Context, Result};
use cadsync_core::models::{EntityError, EntityOutcome, ImportReport};
use cadsync_engine::SyncEngine;
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ImportArgs,
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

    if dry_run {
        let report = engine.preview_drawing(project_id, &drawing).await?;
        output.info("Dry run: nothing was written");
        render(output, &report);
        return output.result(serde_json::json!({ "dry_run": true, "report": report }));
    }

    let (cancel, interrupt) = cancel_on_interrupt();
    let report = engine.import_drawing(project_id, &drawing, &cancel).await;
    interrupt.abort();
    let report = report.context("Import failed")?;

    render(output, &report);
    output.result(&report)
}

pub(super) fn render(output: &OutputWriter, report: &ImportReport) {
    output.section(format!("Import of {}", report.source_name));
    output.kv("Entities parsed", report.total_parsed);
    output.kv("Typed objects", report.specific);
    output.kv("Generic objects", report.generic);
    output.kv("Skipped", report.skipped);
    render_entities(output, &report.entities, &report.errors);

    let pending = report.needs_review().count();
    if pending > 0 {
        output.warning(format!("{} object(s) need review; see `cadsync queue`", pending));
    }
    if report.cancelled {
        output.warning("Import was cancelled; remaining entities were not processed");
    } else {
        output.success("Import complete");
    }
}

pub(super) fn render_entities(output: &OutputWriter, entities: &[EntityOutcome], errors: &[EntityError]) {
    output.table(entities.iter().map(EntityRow::from).collect());
    if !errors.is_empty() {
        output.section("Skipped entities");
        output.table(errors.iter().map(ErrorRow::from).collect());
    }
}
