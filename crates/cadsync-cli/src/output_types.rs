//! Table rows for human output

use cadsync_core::models::{
    CanonicalObject, ClassificationResult, EntityError, EntityOutcome, EntityStatus, MatchSource,
};
use tabled::Tabled;

#[derive(Debug, Tabled)]
pub struct EntityRow {
    pub handle: String,
    pub layer: String,
    pub status: String,
    pub object: String,
    pub confidence: String,
}

impl From<&EntityOutcome> for EntityRow {
    fn from(outcome: &EntityOutcome) -> Self {
        let (status, object, confidence) = match &outcome.status {
            EntityStatus::Specific { object, confidence } => {
                ("specific", object.to_string(), format!("{:.2}", confidence))
            }
            EntityStatus::NeedsReview { object, confidence } => {
                ("needs review", object.to_string(), format!("{:.2}", confidence))
            }
            EntityStatus::Modified { object } => ("modified", object.to_string(), String::new()),
            EntityStatus::Unchanged { object } => ("unchanged", object.to_string(), String::new()),
            EntityStatus::Deleted { object } => ("deleted", object.to_string(), String::new()),
            EntityStatus::Skipped { kind } => ("skipped", format!("{:?}", kind), String::new()),
        };
        Self {
            handle: outcome.handle.clone(),
            layer: outcome.layer.clone(),
            status: status.to_string(),
            object,
            confidence,
        }
    }
}

#[derive(Debug, Tabled)]
pub struct ErrorRow {
    pub handle: String,
    pub layer: String,
    pub kind: String,
    pub message: String,
}

impl From<&EntityError> for ErrorRow {
    fn from(error: &EntityError) -> Self {
        Self {
            handle: error.handle.clone(),
            layer: error.layer.clone(),
            kind: format!("{:?}", error.kind),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Tabled)]
pub struct ClassificationRow {
    pub layer: String,
    pub discipline: String,
    pub category: String,
    #[tabled(rename = "type")]
    pub object_type: String,
    pub attributes: String,
    pub phase: String,
    pub confidence: String,
    pub source: String,
}

impl ClassificationRow {
    pub fn new(layer: &str, result: &ClassificationResult) -> Self {
        let source = match &result.source {
            MatchSource::ClientRule { rule_id } => format!("rule {}", rule_id),
            MatchSource::Canonical => "canonical".to_string(),
            MatchSource::Partial => "partial".to_string(),
            MatchSource::None => "none".to_string(),
        };
        let object_type = match (&result.object_type, &result.suggested_object_type) {
            (Some(code), _) => code.clone(),
            (None, Some(suggested)) => format!("{}?", suggested),
            (None, None) => "-".to_string(),
        };
        Self {
            layer: layer.to_string(),
            discipline: dash(result.discipline.as_deref()),
            category: dash(result.category.as_deref()),
            object_type,
            attributes: result.attributes.join(","),
            phase: result.phase.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            confidence: format!("{:.2}", result.confidence),
            source,
        }
    }
}

#[derive(Debug, Tabled)]
pub struct ReviewRow {
    pub id: String,
    pub layer: String,
    pub entity: String,
    pub suggested: String,
    pub confidence: String,
}

impl ReviewRow {
    pub fn new(object: &CanonicalObject) -> Option<Self> {
        let generic = object.attributes.as_generic()?;
        Some(Self {
            id: object.id.to_string(),
            layer: generic.original_layer.clone(),
            entity: generic.original_entity_kind.to_string(),
            suggested: dash(generic.suggested_object_type.as_deref()),
            confidence: format!("{:.2}", generic.confidence),
        })
    }
}

#[derive(Debug, Tabled)]
pub struct ConfigRow {
    pub key: String,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Tabled)]
pub struct MigrationRow {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

fn dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
