//! Export of canonical objects back to a clean drawing

use cadsync_core::config::{SyncConfig, DEFAULT_EXPORT_LAYER};
use cadsync_core::error::Result;
use cadsync_core::formats::{DxfWriter, OutputEntity};
use cadsync_core::models::{CanonicalObject, Crs, ExportSkip, ExportSummary};
use cadsync_geo::CoordinateTransformer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::layers::LayerGenerator;

/// How output layer names are produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LayerMode {
    Canonical,
    /// Template with `{discipline}`, `{category}`, `{type}`, `{attributes}`,
    /// `{phase}` and `{geometry}` placeholders
    ClientTemplate { template: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_layer_mode")]
    pub layer_mode: LayerMode,
    /// Stored coordinates are written as-is when unset
    #[serde(default)]
    pub target_crs: Option<Crs>,
    #[serde(default = "default_layer")]
    pub default_layer: String,
}

fn default_layer_mode() -> LayerMode {
    LayerMode::Canonical
}

fn default_layer() -> String {
    DEFAULT_EXPORT_LAYER.to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            layer_mode: LayerMode::Canonical,
            target_crs: None,
            default_layer: default_layer(),
        }
    }
}

impl From<&SyncConfig> for ExportConfig {
    fn from(config: &SyncConfig) -> Self {
        Self { default_layer: config.default_layer.clone(), ..Self::default() }
    }
}

impl ExportConfig {
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.layer_mode = LayerMode::ClientTemplate { template: template.into() };
        self
    }

    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = Some(crs);
        self
    }
}

/// DXF document plus what went into it
#[derive(Debug, Clone)]
pub struct ExportedDrawing {
    pub bytes: Vec<u8>,
    pub summary: ExportSummary,
}

/// Lay out objects on their layers and write the document
pub(crate) fn render(
    objects: &[CanonicalObject],
    generator: &LayerGenerator,
    transformer: &CoordinateTransformer,
    config: &ExportConfig,
) -> Result<ExportedDrawing> {
    let mut summary = ExportSummary::default();
    let mut entities = Vec::with_capacity(objects.len());
    let mut layers = BTreeSet::new();

    for object in objects.iter().filter(|object| object.is_exportable()) {
        let geometry = match &config.target_crs {
            Some(target) => match transformer.transform(&object.geometry, &object.crs, target) {
                Ok(geometry) => geometry,
                Err(e) => {
                    tracing::warn!(object = %object.object_ref(), error = %e, "Skipping object on export");
                    summary.skipped.push(ExportSkip { object: object.object_ref(), reason: e.to_string() });
                    continue;
                }
            },
            None => object.geometry.clone(),
        };

        let layer = generator
            .layer_for(object)
            .unwrap_or_else(|| config.default_layer.clone());
        layers.insert(layer.clone());
        entities.push((object.created_at, object.id, OutputEntity::new(layer, geometry)));
    }

    // Stable output for identical stores
    entities.sort_by(|a, b| {
        a.2.layer
            .cmp(&b.2.layer)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });
    let entities: Vec<OutputEntity> = entities.into_iter().map(|(_, _, e)| e).collect();

    let bytes = DxfWriter.write(&entities)?;
    summary.objects_written = entities.len();
    summary.layers = layers.into_iter().collect();

    Ok(ExportedDrawing { bytes, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadsync_core::formats::{DrawingReader, DxfReader};
    use cadsync_core::models::{
        GenericObject, Geometry, ObjectAttributes, Phase, ProjectId, ReviewStatus, UtilityLine,
        EntityKind,
    };
    use std::collections::BTreeMap;

    fn storm_line(project_id: ProjectId) -> CanonicalObject {
        let mut object = CanonicalObject::new(
            project_id,
            Geometry::line([0.0, 0.0, 0.0], [100.0, 0.0, 0.0]),
            Crs::local(),
            ObjectAttributes::UtilityLine(UtilityLine {
                system: "STORM".to_string(),
                diameter_in: Some(12.0),
                material: None,
                length: 100.0,
            }),
            1.0,
        );
        object.discipline = Some("CIV".to_string());
        object.phase = Some(Phase::Proposed);
        object
    }

    fn generic(project_id: ProjectId) -> CanonicalObject {
        CanonicalObject::new(
            project_id,
            Geometry::point(5.0, 5.0, 0.0),
            Crs::local(),
            ObjectAttributes::Generic(GenericObject {
                original_layer: "MISC_STUFF".to_string(),
                original_entity_kind: EntityKind::Point,
                confidence: 0.0,
                needs_review: true,
                review_status: ReviewStatus::Pending,
                suggested_object_type: None,
                overflow: BTreeMap::new(),
                source_handle: None,
            }),
            0.0,
        )
    }

    #[test]
    fn test_layers_and_default_layer() {
        let project_id = ProjectId::new();
        let objects = vec![storm_line(project_id), generic(project_id)];

        let exported = render(
            &objects,
            &LayerGenerator::canonical(),
            &CoordinateTransformer::default(),
            &ExportConfig::default(),
        )
        .unwrap();

        assert_eq!(exported.summary.objects_written, 2);
        assert_eq!(exported.summary.layers, vec!["CIV-UTIL-STORM-12IN-NEW-LN", "MISC"]);
        assert!(exported.summary.skipped.is_empty());

        let parsed = DxfReader.parse("out.dxf", &exported.bytes).unwrap();
        let mut layers: Vec<_> = parsed.entities.iter().map(|e| e.layer.as_str()).collect();
        layers.sort();
        assert_eq!(layers, vec!["CIV-UTIL-STORM-12IN-NEW-LN", "MISC"]);
    }

    #[test]
    fn test_untransformable_objects_are_skipped() {
        let project_id = ProjectId::new();
        let objects = vec![storm_line(project_id)];
        let config = ExportConfig::default().with_target_crs(Crs::wgs84());

        // No georeference, so local coordinates cannot be projected
        let exported = render(
            &objects,
            &LayerGenerator::canonical(),
            &CoordinateTransformer::default(),
            &config,
        )
        .unwrap();

        assert_eq!(exported.summary.objects_written, 0);
        assert_eq!(exported.summary.skipped.len(), 1);
        assert_eq!(exported.summary.skipped[0].object, objects[0].object_ref());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ExportConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExportConfig::default());

        let config: ExportConfig = serde_json::from_str(
            r#"{"layer_mode": {"mode": "client_template", "template": "C-{type}"}}"#,
        )
        .unwrap();
        assert_eq!(config.layer_mode, LayerMode::ClientTemplate { template: "C-{type}".to_string() });
        assert_eq!(config.default_layer, "MISC");
    }
}
