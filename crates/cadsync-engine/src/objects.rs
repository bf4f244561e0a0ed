//! Typed and generic canonical objects built from classified entities

use cadsync_core::models::{
    Alignment, Bmp, CanonicalObject, ClassificationResult, Crs, DrawingEntity, GenericObject,
    Geometry, ObjectAttributes, ObjectKind, ProjectId, ReviewStatus, SurveyPoint, UtilityLine,
    UtilityStructure,
};
use cadsync_geo::GeometryExt;
use std::collections::BTreeMap;

use crate::layers::resolved_kind;
use crate::layers::vocabulary as vocab;

/// Builds the object an entity turns into
#[derive(Debug, Clone, Copy)]
pub struct ObjectBuilder {
    threshold: f64,
}

impl ObjectBuilder {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Typed object when the classification is specific and the geometry
    /// fits the kind, otherwise a generic object awaiting review
    pub fn build(
        &self,
        project_id: ProjectId,
        entity: &DrawingEntity,
        classification: &ClassificationResult,
        crs: Crs,
    ) -> CanonicalObject {
        if classification.is_specific(self.threshold) {
            match resolved_kind(classification) {
                Some(kind) => {
                    if let Some(attributes) =
                        typed_attributes(kind, classification, &entity.geometry, entity.text.as_deref())
                    {
                        let mut object = CanonicalObject::new(
                            project_id,
                            entity.geometry.clone(),
                            crs,
                            attributes,
                            classification.confidence,
                        );
                        object.discipline = classification.discipline.clone();
                        object.phase = classification.phase;
                        return object;
                    }
                    tracing::debug!(
                        handle = %entity.handle,
                        layer = %entity.layer,
                        kind = %kind,
                        geometry = ?entity.geometry.geometry_type(),
                        "Geometry does not fit the classified kind, routing to review"
                    );
                }
                None => {
                    tracing::debug!(
                        handle = %entity.handle,
                        layer = %entity.layer,
                        object_type = ?classification.object_type,
                        "Classified codes resolve to no object kind, routing to review"
                    );
                }
            }
        }

        generic_object(project_id, entity, classification, crs)
    }
}

/// Per-kind fields, `None` when the geometry cannot carry the kind
pub fn typed_attributes(
    kind: ObjectKind,
    classification: &ClassificationResult,
    geometry: &Geometry,
    text: Option<&str>,
) -> Option<ObjectAttributes> {
    if !vocab::accepts_geometry(kind, geometry.geometry_type()) {
        return None;
    }
    let object_type = classification.object_type.clone()?;
    let attributes = &classification.attributes;

    Some(match kind {
        ObjectKind::UtilityLine => ObjectAttributes::UtilityLine(UtilityLine {
            system: object_type,
            diameter_in: attributes.iter().find_map(|a| vocab::parse_diameter(a)),
            material: attributes.iter().find(|a| vocab::is_material(a)).cloned(),
            length: geometry.length_3d(),
        }),
        ObjectKind::UtilityStructure => ObjectAttributes::UtilityStructure(UtilityStructure {
            structure_type: object_type,
            system: attributes
                .iter()
                .find(|a| vocab::UTILITY_SYSTEMS.contains(&a.as_str()))
                .cloned(),
            rim_elevation: geometry.elevation(),
        }),
        ObjectKind::Bmp => ObjectAttributes::Bmp(Bmp {
            bmp_type: object_type,
            area: geometry.plan_area(),
        }),
        ObjectKind::Alignment => ObjectAttributes::Alignment(Alignment {
            alignment_type: object_type,
            length: geometry.length_3d(),
        }),
        ObjectKind::SurveyPoint => ObjectAttributes::SurveyPoint(SurveyPoint {
            point_type: object_type,
            elevation: geometry.elevation()?,
            description: text.map(str::to_string),
        }),
        ObjectKind::Generic => return None,
    })
}

fn generic_object(
    project_id: ProjectId,
    entity: &DrawingEntity,
    classification: &ClassificationResult,
    crs: Crs,
) -> CanonicalObject {
    let mut overflow = BTreeMap::new();
    let raw = &entity.attributes;
    if let Some(color) = raw.color {
        overflow.insert("color".to_string(), color.to_string());
    }
    if let Some(weight) = raw.line_weight {
        overflow.insert("line_weight".to_string(), weight.to_string());
    }
    if let Some(line_type) = &raw.line_type {
        overflow.insert("line_type".to_string(), line_type.clone());
    }
    if let Some(block) = &entity.block_name {
        overflow.insert("block_name".to_string(), block.clone());
    }
    if let Some(text) = &entity.text {
        overflow.insert("text".to_string(), text.clone());
    }
    if let Some(category) = &classification.category {
        overflow.insert("category".to_string(), category.clone());
    }
    if let Some(object_type) = &classification.object_type {
        overflow.insert("object_type".to_string(), object_type.clone());
    }
    if !classification.attributes.is_empty() {
        overflow.insert("attributes".to_string(), classification.attributes.join("-"));
    }

    let generic = GenericObject {
        original_layer: entity.layer.clone(),
        original_entity_kind: entity.kind.clone(),
        confidence: classification.confidence,
        needs_review: true,
        review_status: ReviewStatus::Pending,
        suggested_object_type: classification.suggested_object_type.clone(),
        overflow,
        source_handle: Some(entity.handle.clone()),
    };

    let mut object = CanonicalObject::new(
        project_id,
        entity.geometry.clone(),
        crs,
        ObjectAttributes::Generic(generic),
        classification.confidence,
    );
    object.discipline = classification.discipline.clone();
    object.phase = classification.phase;
    object
}

/// Replace an object's geometry and re-derive the measured fields
pub fn replace_geometry(object: &mut CanonicalObject, geometry: Geometry) {
    match &mut object.attributes {
        ObjectAttributes::UtilityLine(line) => line.length = geometry.length_3d(),
        ObjectAttributes::UtilityStructure(s) => {
            if geometry.elevation().is_some() {
                s.rim_elevation = geometry.elevation();
            }
        }
        ObjectAttributes::Bmp(bmp) => bmp.area = geometry.plan_area().or(bmp.area),
        ObjectAttributes::Alignment(a) => a.length = geometry.length_3d(),
        ObjectAttributes::SurveyPoint(p) => {
            if let Some(z) = geometry.elevation() {
                p.elevation = z;
            }
        }
        ObjectAttributes::Generic(_) => {}
    }
    object.geometry = geometry;
}
