//! CadSync CLI - Command-line interface
//!
//! Drives imports, reimports, exports and review against the in-memory
//! snapshot store or PostgreSQL.

mod cli;
mod commands;
mod config;
mod output;
mod output_types;
mod storage;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;

    // Errors are already reported in the selected output format
    if runtime.block_on(commands::execute(cli)).is_err() {
        std::process::exit(1);
    }

    Ok(())
}
