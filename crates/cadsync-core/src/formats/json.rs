//! JSON interchange reader
//!
//! The interchange document is what CAD-side export scripts emit when a DXF
//! round trip is not practical:
//!
//! ```json
//! {
//!   "drawing_id": "C-101",
//!   "entities": [
//!     { "handle": "2F", "layer": "CIV-UTIL-STORM-12IN-NEW-LN", "kind": "line",
//!       "geometry": { "type": "LineString", "coordinates": [[0, 0], [100, 0]] } }
//!   ]
//! }
//! ```
//!
//! 2-D coordinates are padded with `z = 0.0`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CadSyncError, Result};
use crate::formats::DrawingReader;
use crate::models::{DrawingEntity, EntityKind, Geometry, ParseIssue, ParsedDrawing, RawAttributes};

pub struct JsonReader;

#[derive(Debug, Deserialize)]
struct InterchangeDocument {
    #[serde(default)]
    drawing_id: Option<String>,
    entities: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct InterchangeEntity {
    handle: String,
    layer: String,
    kind: String,
    geometry: Value,
    #[serde(default)]
    attributes: RawAttributes,
    #[serde(default)]
    block_name: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl DrawingReader for JsonReader {
    fn parse(&self, source_name: &str, bytes: &[u8]) -> Result<ParsedDrawing> {
        let document: InterchangeDocument =
            serde_json::from_slice(bytes).map_err(|e| CadSyncError::Parse {
                handle: source_name.to_string(),
                reason: format!("Invalid interchange document: {}", e),
            })?;

        let mut parsed = ParsedDrawing::new(source_name, Vec::new());
        parsed.drawing_id = document.drawing_id;

        for (index, value) in document.entities.into_iter().enumerate() {
            match convert_entity(value) {
                Ok(entity) => parsed.entities.push(entity),
                Err(issue) => {
                    let handle = if issue.handle.is_empty() {
                        format!("IDX{}", index)
                    } else {
                        issue.handle
                    };
                    parsed.issues.push(ParseIssue { handle, ..issue });
                }
            }
        }

        Ok(parsed)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }

    fn format_name(&self) -> &str {
        "JSON interchange"
    }
}

fn convert_entity(value: Value) -> std::result::Result<DrawingEntity, ParseIssue> {
    let handle = value.get("handle").and_then(Value::as_str).unwrap_or_default().to_string();
    let layer = value.get("layer").and_then(Value::as_str).unwrap_or_default().to_string();

    let raw: InterchangeEntity = serde_json::from_value(value).map_err(|e| ParseIssue {
        handle: handle.clone(),
        layer: layer.clone(),
        reason: format!("malformed entity: {}", e),
    })?;

    let mut geometry_value = raw.geometry;
    pad_coordinates(&mut geometry_value);
    let geometry = Geometry::from_geojson(&geometry_value).ok_or_else(|| ParseIssue {
        handle: handle.clone(),
        layer: layer.clone(),
        reason: "geometry is not a Point, LineString or Polygon".to_string(),
    })?;

    let mut entity = DrawingEntity::new(raw.handle, raw.layer, EntityKind::parse(&raw.kind), geometry)
        .with_attributes(raw.attributes);
    entity.block_name = raw.block_name;
    entity.text = raw.text;
    Ok(entity)
}

/// Turn every `[x, y]` position into `[x, y, 0.0]`
fn pad_coordinates(geometry: &mut Value) {
    if let Some(coordinates) = geometry.get_mut("coordinates") {
        pad_positions(coordinates);
    }
}

fn pad_positions(value: &mut Value) {
    if let Value::Array(items) = value {
        if items.len() == 2 && items.iter().all(Value::is_number) {
            items.push(Value::from(0.0));
        } else {
            items.iter_mut().for_each(pad_positions);
        }
    }
}
