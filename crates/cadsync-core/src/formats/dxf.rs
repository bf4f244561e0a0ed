//! DXF reader and writer built on the `dxf` crate

use ::dxf::entities::{Entity, EntityType, Line, ModelPoint, Polyline, Vertex};
use ::dxf::enums::AcadVersion;
use ::dxf::tables::Layer;
use ::dxf::{Color, Drawing, Point};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::Cursor;

use crate::error::{CadSyncError, Result};
use crate::formats::{DrawingReader, OutputEntity};
use crate::models::{
    DrawingEntity, EntityKind, Geometry, ParseIssue, ParsedDrawing, RawAttributes,
};

/// Reads AutoCAD DXF drawings
pub struct DxfReader;

#[async_trait]
impl DrawingReader for DxfReader {
    fn parse(&self, source_name: &str, bytes: &[u8]) -> Result<ParsedDrawing> {
        let drawing = Drawing::load(&mut Cursor::new(bytes)).map_err(|e| CadSyncError::Parse {
            handle: source_name.to_string(),
            reason: format!("Failed to load DXF: {}", e),
        })?;

        let mut parsed = ParsedDrawing::new(source_name, Vec::new());
        for (index, entity) in drawing.entities().enumerate() {
            let handle = entity_handle(entity, index);
            match convert_entity(entity) {
                Ok(Some((kind, geometry))) => {
                    let mut record =
                        DrawingEntity::new(handle, entity.common.layer.clone(), kind, geometry)
                            .with_attributes(raw_attributes(entity));
                    match &entity.specific {
                        EntityType::Insert(insert) => record.block_name = Some(insert.name.clone()),
                        EntityType::Text(text) => record.text = Some(text.value.clone()),
                        _ => {}
                    }
                    parsed.entities.push(record);
                }
                Ok(None) => parsed.issues.push(ParseIssue {
                    handle,
                    layer: entity.common.layer.clone(),
                    reason: format!("unmapped entity kind {}", entity_type_name(&entity.specific)),
                }),
                Err(reason) => parsed.issues.push(ParseIssue {
                    handle,
                    layer: entity.common.layer.clone(),
                    reason,
                }),
            }
        }

        tracing::debug!(
            source = source_name,
            entities = parsed.entities.len(),
            issues = parsed.issues.len(),
            "Parsed DXF drawing"
        );

        Ok(parsed)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["dxf"]
    }

    fn format_name(&self) -> &str {
        "DXF"
    }
}

/// Handles are written as uppercase hex, the way CAD tools display them.
/// Files without handles fall back to the entity's position in the file.
fn entity_handle(entity: &Entity, index: usize) -> String {
    let handle = entity.common.handle.0;
    if handle == 0 {
        format!("IDX{}", index)
    } else {
        format!("{:X}", handle)
    }
}

fn raw_attributes(entity: &Entity) -> RawAttributes {
    let common = &entity.common;
    let line_type = if common.line_type_name.is_empty()
        || common.line_type_name.eq_ignore_ascii_case("BYLAYER")
    {
        None
    } else {
        Some(common.line_type_name.clone())
    };

    RawAttributes {
        color: common.color.index().map(i16::from),
        // Negative values are BYLAYER / BYBLOCK / default
        line_weight: (common.lineweight_enum_value >= 0).then_some(common.lineweight_enum_value),
        line_type,
    }
}

fn convert_entity(
    entity: &Entity,
) -> std::result::Result<Option<(EntityKind, Geometry)>, String> {
    let converted = match &entity.specific {
        EntityType::Line(line) => (
            EntityKind::Line,
            Geometry::line(xyz(&line.p1), xyz(&line.p2)),
        ),
        EntityType::ModelPoint(point) => (EntityKind::Point, point_geometry(&point.location)),
        EntityType::Insert(insert) => (EntityKind::Insert, point_geometry(&insert.location)),
        EntityType::Text(text) => (EntityKind::Text, point_geometry(&text.location)),
        EntityType::Circle(circle) => (EntityKind::Circle, point_geometry(&circle.center)),
        EntityType::LwPolyline(poly) => {
            let coords: Vec<[f64; 3]> = poly
                .vertices
                .iter()
                .map(|v| [v.x, v.y, entity.common.elevation])
                .collect();
            path_geometry(coords, poly.is_closed())?
        }
        EntityType::Polyline(poly) => {
            let elevation = if poly.is_3d_polyline() { 0.0 } else { poly.location.z };
            let coords: Vec<[f64; 3]> = poly
                .vertices()
                .map(|v| [v.location.x, v.location.y, v.location.z + elevation])
                .collect();
            path_geometry(coords, poly.is_closed())?
        }
        _ => return Ok(None),
    };
    Ok(Some(converted))
}

fn path_geometry(
    mut coords: Vec<[f64; 3]>,
    closed: bool,
) -> std::result::Result<(EntityKind, Geometry), String> {
    if coords.is_empty() {
        return Err("polyline has no vertices".to_string());
    }
    if closed {
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        Ok((EntityKind::Polygon, Geometry::polygon(vec![coords])))
    } else {
        Ok((EntityKind::Polyline, Geometry::line_string(coords)))
    }
}

fn point_geometry(p: &Point) -> Geometry {
    Geometry::point(p.x, p.y, p.z)
}

fn xyz(p: &Point) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn entity_type_name(specific: &EntityType) -> &'static str {
    match specific {
        EntityType::Arc(_) => "ARC",
        EntityType::MText(_) => "MTEXT",
        EntityType::RotatedDimension(_)
        | EntityType::RadialDimension(_)
        | EntityType::DiameterDimension(_) => "DIMENSION",
        _ => "unsupported",
    }
}

/// Writes canonical objects back out as DXF
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfWriter;

impl DxfWriter {
    /// Serialize entities into a DXF document.
    ///
    /// Points become POINT, two-vertex lines become LINE, longer paths become
    /// 3D POLYLINE and every polygon ring becomes a closed 3D POLYLINE.
    pub fn write(&self, entities: &[OutputEntity]) -> Result<Vec<u8>> {
        let mut drawing = Drawing::new();
        drawing.header.version = AcadVersion::R2000;

        let layers: BTreeSet<&str> = entities.iter().map(|e| e.layer.as_str()).collect();
        for name in layers {
            if name == "0" {
                continue;
            }
            let mut layer = Layer::default();
            layer.name = name.to_string();
            drawing.add_layer(layer);
        }

        for output in entities {
            for specific in to_dxf_entities(&mut drawing, &output.geometry) {
                let mut entity = Entity::new(specific);
                entity.common.layer = output.layer.clone();
                if let Some(index) = output.color.and_then(|c| u8::try_from(c).ok()) {
                    entity.common.color = Color::from_index(index);
                }
                drawing.add_entity(entity);
            }
        }

        let mut buf = Vec::new();
        drawing
            .save(&mut buf)
            .map_err(|e| CadSyncError::Serialization(format!("Failed to write DXF: {}", e)))?;
        Ok(buf)
    }
}

fn to_dxf_entities(drawing: &mut Drawing, geometry: &Geometry) -> Vec<EntityType> {
    match geometry {
        Geometry::Point { coordinates } => {
            let mut point = ModelPoint::default();
            point.location = dxf_point(coordinates);
            vec![EntityType::ModelPoint(point)]
        }
        Geometry::LineString { coordinates } if coordinates.len() == 2 => {
            let mut line = Line::default();
            line.p1 = dxf_point(&coordinates[0]);
            line.p2 = dxf_point(&coordinates[1]);
            vec![EntityType::Line(line)]
        }
        Geometry::LineString { coordinates } => {
            vec![EntityType::Polyline(polyline(drawing, coordinates, false))]
        }
        Geometry::Polygon { coordinates } => coordinates
            .iter()
            .map(|ring| {
                let open = match (ring.first(), ring.last()) {
                    (Some(first), Some(last)) if ring.len() > 1 && first == last => {
                        &ring[..ring.len() - 1]
                    }
                    _ => &ring[..],
                };
                EntityType::Polyline(polyline(drawing, open, true))
            })
            .collect(),
    }
}

fn polyline(drawing: &mut Drawing, coords: &[[f64; 3]], closed: bool) -> Polyline {
    let mut poly = Polyline::default();
    poly.set_is_3d_polyline(true);
    poly.set_is_closed(closed);
    for c in coords {
        let mut vertex = Vertex::default();
        vertex.location = dxf_point(c);
        poly.add_vertex(drawing, vertex);
    }
    poly
}

fn dxf_point(c: &[f64; 3]) -> Point {
    Point::new(c[0], c[1], c[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::dxf::entities::Arc;

    fn output(layer: &str, geometry: Geometry) -> OutputEntity {
        OutputEntity::new(layer, geometry)
    }

    #[test]
    fn test_written_drawing_reads_back() {
        let entities = vec![
            output(
                "CIV-UTIL-STORM-12IN-NEW-LN",
                Geometry::line([0.0, 0.0, 100.0], [100.0, 0.0, 99.5]),
            ),
            output(
                "CIV-STRM-BIOR-NEW-PG",
                Geometry::polygon(vec![vec![
                    [0.0, 0.0, 0.0],
                    [10.0, 0.0, 0.0],
                    [10.0, 10.0, 0.0],
                    [0.0, 0.0, 0.0],
                ]]),
            ),
            output("SURV-CTRL-MON-EXIST-PT", Geometry::point(5.0, 5.0, 12.25)),
        ];

        let bytes = DxfWriter.write(&entities).unwrap();
        let parsed = DxfReader.parse("roundtrip.dxf", &bytes).unwrap();

        assert_eq!(parsed.entities.len(), 3);
        assert!(parsed.issues.is_empty());

        let line = &parsed.entities[0];
        assert_eq!(line.layer, "CIV-UTIL-STORM-12IN-NEW-LN");
        assert_eq!(line.kind, EntityKind::Line);
        assert_eq!(line.geometry, Geometry::line([0.0, 0.0, 100.0], [100.0, 0.0, 99.5]));

        let polygon = &parsed.entities[1];
        assert_eq!(polygon.kind, EntityKind::Polygon);
        assert_eq!(polygon.geometry.vertex_count(), 4);

        let point = &parsed.entities[2];
        assert_eq!(point.kind, EntityKind::Point);
        assert_eq!(point.geometry, Geometry::point(5.0, 5.0, 12.25));
    }

    #[test]
    fn test_handles_are_unique() {
        let entities: Vec<_> = (0..5)
            .map(|i| output("0", Geometry::point(i as f64, 0.0, 0.0)))
            .collect();
        let bytes = DxfWriter.write(&entities).unwrap();
        let parsed = DxfReader.parse("points.dxf", &bytes).unwrap();

        let handles: BTreeSet<_> = parsed.entities.iter().map(|e| e.handle.clone()).collect();
        assert_eq!(handles.len(), 5);
        assert!(handles.iter().all(|h| !h.is_empty()));
    }

    #[test]
    fn test_unmapped_entity_becomes_issue() {
        let mut drawing = Drawing::new();
        drawing.header.version = AcadVersion::R2000;
        let mut arc = Arc::default();
        arc.radius = 2.0;
        let mut entity = Entity::new(EntityType::Arc(arc));
        entity.common.layer = "C-ARC".to_string();
        drawing.add_entity(entity);

        let mut buf = Vec::new();
        drawing.save(&mut buf).unwrap();

        let parsed = DxfReader.parse("arc.dxf", &buf).unwrap();
        assert!(parsed.entities.is_empty());
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.issues[0].layer, "C-ARC");
        assert_eq!(parsed.issues[0].reason, "unmapped entity kind ARC");
    }

    #[test]
    fn test_entity_type_names() {
        assert_eq!(entity_type_name(&EntityType::Arc(Arc::default())), "ARC");
        assert_eq!(
            entity_type_name(&EntityType::MText(::dxf::entities::MText::default())),
            "MTEXT"
        );
        assert_eq!(
            entity_type_name(&EntityType::Line(::dxf::entities::Line::default())),
            "unsupported"
        );
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let result = DxfReader.parse("broken.dxf", b"not a drawing");
        assert!(result.is_err());
    }
}
