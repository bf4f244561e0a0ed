//! Layer classification results and client pattern rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Construction phase encoded in a layer name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Existing,
    Proposed,
    Abandoned,
}

impl Phase {
    /// Canonical layer token
    pub fn code(&self) -> &'static str {
        match self {
            Phase::Existing => "EXIST",
            Phase::Proposed => "NEW",
            Phase::Abandoned => "ABAN",
        }
    }

    /// Parse a layer token, accepting the common aliases
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "EXIST" | "EX" | "EXST" => Some(Phase::Existing),
            "NEW" | "PROP" | "PR" => Some(Phase::Proposed),
            "ABAN" | "ABND" | "DEMO" | "RMV" => Some(Phase::Abandoned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Existing => "existing",
            Phase::Proposed => "proposed",
            Phase::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "existing" => Some(Phase::Existing),
            "proposed" => Some(Phase::Proposed),
            "abandoned" => Some(Phase::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a classification came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MatchSource {
    ClientRule { rule_id: String },
    Canonical,
    Partial,
    None,
}

/// Outcome of classifying one layer name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub discipline: Option<String>,
    pub category: Option<String>,
    pub object_type: Option<String>,
    pub attributes: Vec<String>,
    pub phase: Option<Phase>,
    pub geometry_kind: Option<String>,
    pub confidence: f64,
    pub source: MatchSource,
    /// Best-guess object type for review, may be empty
    pub suggested_object_type: Option<String>,
}

impl ClassificationResult {
    /// Nothing recognized
    pub fn unmatched() -> Self {
        Self {
            discipline: None,
            category: None,
            object_type: None,
            attributes: Vec::new(),
            phase: None,
            geometry_kind: None,
            confidence: 0.0,
            source: MatchSource::None,
            suggested_object_type: None,
        }
    }

    pub fn is_specific(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Positional meaning of a pattern rule's capture group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSlot {
    Discipline,
    Category,
    ObjectType,
    Attribute,
    Phase,
    Geometry,
    Ignore,
}

/// Per-client regex rule mapping a layer naming convention onto canonical codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub client_id: String,
    /// Lower values are evaluated first
    pub priority: i32,
    pub pattern: String,
    /// Slot for capture group `i + 1`
    pub slots: Vec<TokenSlot>,
    /// Codes applied when the slot is not captured
    #[serde(default)]
    pub defaults: HashMap<TokenSlotKey, String>,
    /// Client code to canonical code, e.g. `SD` to `STORM`
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    pub confidence: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Slots that accept a fixed default code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSlotKey {
    Discipline,
    Category,
    ObjectType,
    Phase,
    Geometry,
}

impl PatternRule {
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        priority: i32,
        pattern: impl Into<String>,
        slots: Vec<TokenSlot>,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            priority,
            pattern: pattern.into(),
            slots,
            defaults: HashMap::new(),
            aliases: HashMap::new(),
            confidence,
            active: true,
        }
    }

    pub fn with_default(mut self, slot: TokenSlotKey, code: impl Into<String>) -> Self {
        self.defaults.insert(slot, code.into());
        self
    }

    pub fn with_alias(mut self, client_code: impl Into<String>, code: impl Into<String>) -> Self {
        self.aliases.insert(client_code.into().to_ascii_uppercase(), code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_codes() {
        assert_eq!(Phase::from_code("new"), Some(Phase::Proposed));
        assert_eq!(Phase::from_code("EX"), Some(Phase::Existing));
        assert_eq!(Phase::from_code("DEMO"), Some(Phase::Abandoned));
        assert_eq!(Phase::from_code("LN"), None);
        for phase in [Phase::Existing, Phase::Proposed, Phase::Abandoned] {
            assert_eq!(Phase::from_code(phase.code()), Some(phase));
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut result = ClassificationResult::unmatched();
        result.confidence = 0.70;
        assert!(result.is_specific(0.7));
        result.confidence = 0.699999;
        assert!(!result.is_specific(0.7));
    }
}
