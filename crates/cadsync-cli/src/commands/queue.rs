use super::parse_project;
use crate::cli::QueueArgs;
use crate::output::OutputWriter;
use crate::output_types::ReviewRow;
use anyhow::Result;
use cadsync_engine::SyncEngine;
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: QueueArgs,
    output: &OutputWriter,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;
    let queue = engine.review_queue(project_id).await?;

    output.section(format!("{} object(s) awaiting review", queue.len()));
    output.table(queue.iter().filter_map(ReviewRow::new).collect());
    output.result(&queue)
}
