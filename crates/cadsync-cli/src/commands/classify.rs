use super::parse_project;
use crate::cli::ClassifyArgs;
use crate::output::OutputWriter;
use crate::output_types::ClassificationRow;
use anyhow::Result;
use cadsync_engine::SyncEngine;
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ClassifyArgs,
    output: &OutputWriter,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;
    let threshold = engine.config().specific_threshold;

    let mut rows = Vec::with_capacity(args.layers.len());
    let mut results = Vec::with_capacity(args.layers.len());
    for layer in &args.layers {
        let result = engine.classify(project_id, layer).await?;
        rows.push(ClassificationRow::new(layer, &result));
        results.push(serde_json::json!({
            "layer": layer,
            "specific": result.is_specific(threshold),
            "classification": result,
        }));
    }

    output.table(rows);
    output.info(format!("Typed objects need confidence >= {:.2}", threshold));
    output.result(results)
}
