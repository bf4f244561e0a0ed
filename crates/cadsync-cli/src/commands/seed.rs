use crate::cli::SeedArgs;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use cadsync_core::models::{PatternRule, Project};
use cadsync_store::ReferenceSeed;
use serde::Deserialize;
use std::path::Path;

/// Reference data file accepted by `cadsync seed`
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub pattern_rules: Vec<PatternRule>,
}

impl SeedFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed: SeedFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid seed file {}", path.display()))?;

        for rule in &seed.pattern_rules {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                anyhow::bail!("Pattern rule {} has an invalid pattern: {}", rule.id, e);
            }
        }
        Ok(seed)
    }
}

pub async fn execute<S: ReferenceSeed + ?Sized>(
    store: &S,
    args: SeedArgs,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    let seed = SeedFile::load(&args.file).await?;

    if dry_run {
        output.info(format!(
            "Dry run: would load {} project(s) and {} pattern rule(s)",
            seed.projects.len(),
            seed.pattern_rules.len()
        ));
    } else {
        for project in &seed.projects {
            store.put_project(project).await?;
        }
        for rule in &seed.pattern_rules {
            store.put_pattern_rule(rule).await?;
        }
        output.success(format!(
            "Loaded {} project(s) and {} pattern rule(s)",
            seed.projects.len(),
            seed.pattern_rules.len()
        ));
    }

    for project in &seed.projects {
        output.kv(&project.name, project.id);
    }

    output.result(serde_json::json!({
        "dry_run": dry_run,
        "projects": seed.projects,
        "pattern_rules": seed.pattern_rules.len(),
    }))
}
