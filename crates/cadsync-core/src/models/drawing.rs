//! Transient drawing records produced by a file parse.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::Geometry;

/// Kind of source entity as reported by the drawing reader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Point,
    Line,
    Polyline,
    Polygon,
    Insert,
    Text,
    Circle,
    /// Anything the reader could not map; rejected by the import pipeline
    Other(String),
}

impl EntityKind {
    pub fn as_str(&self) -> &str {
        match self {
            EntityKind::Point => "point",
            EntityKind::Line => "line",
            EntityKind::Polyline => "polyline",
            EntityKind::Polygon => "polygon",
            EntityKind::Insert => "insert",
            EntityKind::Text => "text",
            EntityKind::Circle => "circle",
            EntityKind::Other(name) => name,
        }
    }

    /// Parse the storage form written by [`EntityKind::as_str`]
    pub fn parse(s: &str) -> Self {
        match s {
            "point" => EntityKind::Point,
            "line" => EntityKind::Line,
            "polyline" => EntityKind::Polyline,
            "polygon" => EntityKind::Polygon,
            "insert" => EntityKind::Insert,
            "text" => EntityKind::Text,
            "circle" => EntityKind::Circle,
            other => EntityKind::Other(other.to_string()),
        }
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, EntityKind::Other(_))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display attributes carried by the source entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAttributes {
    /// AutoCAD color index, `None` for BYLAYER
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_weight: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_type: Option<String>,
}

/// One entity from a parsed drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingEntity {
    /// Stable per-file entity identifier
    pub handle: String,
    pub layer: String,
    pub kind: EntityKind,
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: RawAttributes,
    /// Block name for inserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
    /// String value for text entities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl DrawingEntity {
    pub fn new(
        handle: impl Into<String>,
        layer: impl Into<String>,
        kind: EntityKind,
        geometry: Geometry,
    ) -> Self {
        Self {
            handle: handle.into(),
            layer: layer.into(),
            kind,
            geometry,
            attributes: RawAttributes::default(),
            block_name: None,
            text: None,
        }
    }

    pub fn with_attributes(mut self, attributes: RawAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// An entity the reader saw but could not turn into a [`DrawingEntity`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseIssue {
    pub handle: String,
    pub layer: String,
    pub reason: String,
}

/// Result of parsing one drawing file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDrawing {
    /// File name the drawing was read from
    pub source_name: String,
    /// External file identity, used by drawing-scoped reimport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_id: Option<String>,
    pub entities: Vec<DrawingEntity>,
    #[serde(default)]
    pub issues: Vec<ParseIssue>,
}

impl ParsedDrawing {
    pub fn new(source_name: impl Into<String>, entities: Vec<DrawingEntity>) -> Self {
        Self {
            source_name: source_name.into(),
            drawing_id: None,
            entities,
            issues: Vec::new(),
        }
    }

    pub fn with_drawing_id(mut self, drawing_id: impl Into<String>) -> Self {
        self.drawing_id = Some(drawing_id.into());
        self
    }

    /// Entities plus rejected entities
    pub fn total_parsed(&self) -> usize {
        self.entities.len() + self.issues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_storage_roundtrip() {
        for kind in [
            EntityKind::Point,
            EntityKind::Line,
            EntityKind::Polyline,
            EntityKind::Polygon,
            EntityKind::Insert,
            EntityKind::Text,
            EntityKind::Circle,
        ] {
            assert_eq!(EntityKind::parse(kind.as_str()), kind);
            assert!(kind.is_mapped());
        }
        assert_eq!(EntityKind::parse("HATCH"), EntityKind::Other("HATCH".to_string()));
        assert!(!EntityKind::parse("HATCH").is_mapped());
    }

    #[test]
    fn test_entity_deserializes_without_optional_fields() {
        let json = r#"{
            "handle": "1A",
            "layer": "CIV-UTIL-STORM-12IN-NEW-LN",
            "kind": "line",
            "geometry": {"type": "LineString", "coordinates": [[0,0,0],[100,0,0]]}
        }"#;
        let entity: DrawingEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind, EntityKind::Line);
        assert_eq!(entity.attributes, RawAttributes::default());
        assert!(entity.block_name.is_none());
    }
}
