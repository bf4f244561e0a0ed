use crate::error::{CadSyncError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Default confidence at or above which a typed object is created
pub const DEFAULT_SPECIFIC_THRESHOLD: f64 = 0.7;
/// Default number of decimals kept when hashing coordinates
pub const DEFAULT_HASH_PRECISION: u32 = 6;
/// Default round-trip tolerance in survey length units
pub const DEFAULT_TRANSFORM_TOLERANCE: f64 = 0.001;
/// Default export layer for objects without resolvable type fields
pub const DEFAULT_EXPORT_LAYER: &str = "MISC";

const MAX_HASH_PRECISION: u32 = 12;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Resolved engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub specific_threshold: f64,
    pub hash_precision: u32,
    pub transform_tolerance: f64,
    pub default_layer: String,
    /// SRID used for the per-entity round-trip self-check on import
    pub verify_srid: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            specific_threshold: DEFAULT_SPECIFIC_THRESHOLD,
            hash_precision: DEFAULT_HASH_PRECISION,
            transform_tolerance: DEFAULT_TRANSFORM_TOLERANCE,
            default_layer: DEFAULT_EXPORT_LAYER.to_string(),
            verify_srid: None,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.specific_threshold) {
            return Err(CadSyncError::ConfigInvalid {
                key: "specific_threshold".to_string(),
                reason: format!("must be within [0, 1], got {}", self.specific_threshold),
            });
        }
        if self.hash_precision > MAX_HASH_PRECISION {
            return Err(CadSyncError::ConfigInvalid {
                key: "hash_precision".to_string(),
                reason: format!(
                    "must be at most {} decimals, got {}",
                    MAX_HASH_PRECISION, self.hash_precision
                ),
            });
        }
        if !(self.transform_tolerance > 0.0) {
            return Err(CadSyncError::ConfigInvalid {
                key: "transform_tolerance".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.default_layer.trim().is_empty() {
            return Err(CadSyncError::ConfigInvalid {
                key: "default_layer".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Layered configuration for the sync engine
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub specific_threshold: ConfigValue<f64>,
    pub hash_precision: ConfigValue<u32>,
    pub transform_tolerance: ConfigValue<f64>,
    pub default_layer: ConfigValue<String>,
    pub verify_srid: ConfigValue<Option<u32>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            specific_threshold: ConfigValue::new(
                DEFAULT_SPECIFIC_THRESHOLD,
                ConfigSource::Default,
            ),
            hash_precision: ConfigValue::new(DEFAULT_HASH_PRECISION, ConfigSource::Default),
            transform_tolerance: ConfigValue::new(
                DEFAULT_TRANSFORM_TOLERANCE,
                ConfigSource::Default,
            ),
            default_layer: ConfigValue::new(
                DEFAULT_EXPORT_LAYER.to_string(),
                ConfigSource::Default,
            ),
            verify_srid: ConfigValue::new(None, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| CadSyncError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| CadSyncError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(threshold) = file_config.specific_threshold {
            self.specific_threshold.update(threshold, ConfigSource::File);
        }

        if let Some(precision) = file_config.hash_precision {
            self.hash_precision.update(precision, ConfigSource::File);
        }

        if let Some(tolerance) = file_config.transform_tolerance {
            self.transform_tolerance.update(tolerance, ConfigSource::File);
        }

        if let Some(layer) = file_config.default_layer {
            self.default_layer.update(layer, ConfigSource::File);
        }

        if let Some(srid) = file_config.verify_srid {
            self.verify_srid.update(Some(srid), ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(value) = env::var("CADSYNC_THRESHOLD") {
            match value.parse::<f64>() {
                Ok(threshold) => self.specific_threshold.update(threshold, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CADSYNC_THRESHOLD value '{}': expected a number in [0, 1]",
                    value
                ),
            }
        }

        if let Ok(value) = env::var("CADSYNC_HASH_PRECISION") {
            match value.parse::<u32>() {
                Ok(precision) => self.hash_precision.update(precision, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CADSYNC_HASH_PRECISION value '{}': expected a decimal count",
                    value
                ),
            }
        }

        if let Ok(value) = env::var("CADSYNC_TRANSFORM_TOLERANCE") {
            match value.parse::<f64>() {
                Ok(tolerance) => {
                    self.transform_tolerance.update(tolerance, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid CADSYNC_TRANSFORM_TOLERANCE value '{}': expected a length",
                    value
                ),
            }
        }

        if let Ok(layer) = env::var("CADSYNC_DEFAULT_LAYER") {
            self.default_layer.update(layer, ConfigSource::Environment);
        }

        if let Ok(value) = env::var("CADSYNC_VERIFY_SRID") {
            match value.parse::<u32>() {
                Ok(srid) => self.verify_srid.update(Some(srid), ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid CADSYNC_VERIFY_SRID value '{}': expected integer EPSG code",
                    value
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(threshold) = overrides.specific_threshold {
            self.specific_threshold.update(threshold, ConfigSource::Cli);
        }

        if let Some(precision) = overrides.hash_precision {
            self.hash_precision.update(precision, ConfigSource::Cli);
        }

        if let Some(tolerance) = overrides.transform_tolerance {
            self.transform_tolerance.update(tolerance, ConfigSource::Cli);
        }

        if let Some(layer) = overrides.default_layer {
            self.default_layer.update(layer, ConfigSource::Cli);
        }

        if let Some(srid) = overrides.verify_srid {
            self.verify_srid.update(Some(srid), ConfigSource::Cli);
        }
    }

    /// Collapse the layers into validated engine settings
    pub fn resolve(&self) -> Result<SyncConfig> {
        let config = SyncConfig {
            specific_threshold: self.specific_threshold.value,
            hash_precision: self.hash_precision.value,
            transform_tolerance: self.transform_tolerance.value,
            default_layer: self.default_layer.value.clone(),
            verify_srid: self.verify_srid.value,
        };
        config.validate()?;
        Ok(config)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "specific_threshold".to_string(),
            (self.specific_threshold.value.to_string(), self.specific_threshold.source),
        );

        map.insert(
            "hash_precision".to_string(),
            (self.hash_precision.value.to_string(), self.hash_precision.source),
        );

        map.insert(
            "transform_tolerance".to_string(),
            (self.transform_tolerance.value.to_string(), self.transform_tolerance.source),
        );

        map.insert(
            "default_layer".to_string(),
            (self.default_layer.value.clone(), self.default_layer.source),
        );

        let verify = match self.verify_srid.value {
            Some(srid) => format!("EPSG:{}", srid),
            None => "disabled".to_string(),
        };
        map.insert("verify_srid".to_string(), (verify, self.verify_srid.source));

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    specific_threshold: Option<f64>,
    hash_precision: Option<u32>,
    transform_tolerance: Option<f64>,
    default_layer: Option<String>,
    verify_srid: Option<u32>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub specific_threshold: Option<f64>,
    pub hash_precision: Option<u32>,
    pub transform_tolerance: Option<f64>,
    pub default_layer: Option<String>,
    pub verify_srid: Option<u32>,
}
