//! Command implementations

mod classify;
mod config;
mod db;
mod export;
mod import;
mod queue;
mod reclassify;
mod reimport;
mod review;
mod seed;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use crate::storage::Storage;
use anyhow::{Context, Result};
use cadsync_core::models::{ObjectId, ProjectId};
use cadsync_engine::{CancelFlag, SyncEngine};
use cadsync_store::{CadStore, ReferenceSeed};

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    let result = run(cli, &output).await;
    if let Err(e) = &result {
        output.error(format!("{:#}", e));
    }
    result
}

async fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    match &cli.command {
        Commands::Config => return config::execute(&cli, output),
        Commands::Db(args) => return db::execute(args, output, cli.dry_run).await,
        _ => {}
    }

    let config = crate::config::resolve(&cli)?;
    let storage = Storage::open(cli.storage, &cli.state).await?;
    let persist = cli.command.mutates() && !cli.dry_run;

    match &storage {
        Storage::Memory { store, .. } => {
            let engine = SyncEngine::new(store.clone(), config);
            dispatch(&engine, cli.command, output, cli.dry_run).await?;
        }
        Storage::Postgres(store) => {
            let engine = SyncEngine::new(store.clone(), config);
            dispatch(&engine, cli.command, output, cli.dry_run).await?;
        }
    }

    if persist {
        storage.persist().await?;
    }
    Ok(())
}

async fn dispatch<S: CadStore + ReferenceSeed>(
    engine: &SyncEngine<S>,
    command: Commands,
    output: &OutputWriter,
    dry_run: bool,
) -> Result<()> {
    match command {
        Commands::Import(args) => import::execute(engine, args, output, dry_run).await,
        Commands::Reimport(args) => reimport::execute(engine, args, output, dry_run).await,
        Commands::Export(args) => export::execute(engine, args, output, dry_run).await,
        Commands::Classify(args) => classify::execute(engine, args, output).await,
        Commands::Queue(args) => queue::execute(engine, args, output).await,
        Commands::Review(args) => review::execute(engine, args, output, dry_run).await,
        Commands::Reclassify(args) => reclassify::execute(engine, args, output, dry_run).await,
        Commands::Seed(args) => seed::execute(engine.store().as_ref(), args, output, dry_run).await,
        Commands::Config | Commands::Db(_) => Ok(()),
    }
}

pub(crate) fn parse_project(value: &str) -> Result<ProjectId> {
    value.parse().with_context(|| format!("'{}' is not a valid project id", value))
}

pub(crate) fn parse_object(value: &str) -> Result<ObjectId> {
    value.parse().with_context(|| format!("'{}' is not a valid object id", value))
}

/// Flag that trips on Ctrl-C, so a long import stops between entities
pub(crate) fn cancel_on_interrupt() -> (CancelFlag, tokio::task::JoinHandle<()>) {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.cancel();
        }
    });
    (cancel, handle)
}
