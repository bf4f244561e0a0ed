use super::{parse_object, parse_project};
use crate::cli::{DecisionArg, ReviewArgs};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use cadsync_engine::{ReviewDecision, SyncEngine};
use cadsync_store::CadStore;

pub async fn execute<S: CadStore>(
    engine: &SyncEngine<S>,
    args: ReviewArgs,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    let project_id = parse_project(&args.project)?;
    let object_id = parse_object(&args.object)?;
    let decision = match args.decision {
        DecisionArg::Approve => ReviewDecision::Approve,
        DecisionArg::Ignore => ReviewDecision::Ignore,
    };

    if dry_run {
        output.info(format!("Dry run: would mark {} as {:?}", object_id, decision));
        return output.result(serde_json::json!({
            "dry_run": true,
            "object_id": object_id,
            "decision": decision,
        }));
    }

    let object = engine
        .review(project_id, object_id, decision)
        .await
        .with_context(|| format!("Failed to review {}", object_id))?;

    output.success(format!("Marked {} as {:?}", object_id, decision));
    output.result(&object)
}
