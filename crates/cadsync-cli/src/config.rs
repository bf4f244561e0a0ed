//! Resolve engine settings from defaults, file, environment and flags

use crate::cli::Cli;
use anyhow::{Context, Result};
use cadsync_core::config::{CliConfigOverrides, LayeredConfig, SyncConfig};
use std::path::Path;

/// Picked up from the working directory when `--config` is not given
const LOCAL_CONFIG: &str = "cadsync.toml";

pub fn layered(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    match &cli.config {
        Some(path) => {
            config = config
                .load_from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
        }
        None if Path::new(LOCAL_CONFIG).exists() => {
            config = config
                .load_from_file(LOCAL_CONFIG)
                .with_context(|| format!("Failed to load {}", LOCAL_CONFIG))?;
        }
        None => {}
    }

    let mut config = config.load_from_env();
    config.update_from_cli(CliConfigOverrides {
        specific_threshold: cli.threshold,
        hash_precision: cli.hash_precision,
        transform_tolerance: cli.transform_tolerance,
        default_layer: cli.default_layer.clone(),
        verify_srid: cli.verify_srid,
    });
    Ok(config)
}

pub fn resolve(cli: &Cli) -> Result<SyncConfig> {
    layered(cli)?.resolve().context("Invalid configuration")
}
