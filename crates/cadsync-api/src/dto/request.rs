use cadsync_core::config::SyncConfig;
use cadsync_core::models::Crs;
use cadsync_engine::ExportConfig;
use serde::Deserialize;

/// Export request body; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    /// Client layer template; canonical names when absent
    pub template: Option<String>,
    pub target_srid: Option<u32>,
    pub default_layer: Option<String>,
}

impl ExportRequest {
    pub fn into_config(self, sync: &SyncConfig) -> ExportConfig {
        let mut config = ExportConfig::from(sync);
        if let Some(template) = self.template {
            config = config.with_template(template);
        }
        if let Some(srid) = self.target_srid {
            config = config.with_target_crs(Crs::epsg(srid));
        }
        if let Some(layer) = self.default_layer {
            config.default_layer = layer;
        }
        config
    }
}
