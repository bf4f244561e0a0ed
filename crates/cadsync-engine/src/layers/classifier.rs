//! Layer name classification
//!
//! Client pattern rules are tried first, in priority order. When none match,
//! the name is read with the canonical grammar
//! `DISCIPLINE-CATEGORY-TYPE[-ATTRIBUTE...]-PHASE-GEOMETRY`.

use cadsync_core::models::{
    ClassificationResult, MatchSource, ObjectKind, PatternRule, Phase, TokenSlot, TokenSlotKey,
};
use regex::{Captures, Regex, RegexBuilder};

use super::vocabulary as vocab;

/// Confidence by number of deviations from a full canonical match
pub const DEVIATION_CONFIDENCE: [f64; 4] = [1.0, 0.9, 0.8, 0.7];

/// Structural tokens incomplete, but a known object-type code is present
pub const TYPE_CODE_CONFIDENCE: f64 = 0.5;

/// Only a discipline or category code is present
pub const CODE_ONLY_CONFIDENCE: f64 = 0.3;

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

/// Pure classifier over a fixed rule set
pub struct LayerClassifier {
    rules: Vec<CompiledRule>,
}

impl LayerClassifier {
    /// Classifier with the canonical grammar only
    pub fn canonical() -> Self {
        Self { rules: Vec::new() }
    }

    /// Classifier for a client's rules
    ///
    /// Inactive rules are dropped. A rule whose pattern does not compile is
    /// skipped with a warning so one bad row cannot block an import.
    pub fn with_rules(mut rules: Vec<PatternRule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);

        let rules = rules
            .into_iter()
            .filter(|rule| rule.active)
            .filter_map(|rule| {
                let compiled = RegexBuilder::new(&rule.pattern).case_insensitive(true).build();
                match compiled {
                    Ok(regex) => Some(CompiledRule { rule, regex }),
                    Err(e) => {
                        tracing::warn!(
                            rule_id = %rule.id,
                            client_id = %rule.client_id,
                            error = %e,
                            "Skipping pattern rule with invalid expression"
                        );
                        None
                    }
                }
            })
            .collect();

        Self { rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn classify(&self, layer: &str) -> ClassificationResult {
        let layer = layer.trim();

        for compiled in &self.rules {
            if let Some(captures) = compiled.regex.captures(layer) {
                return from_rule(&compiled.rule, &captures);
            }
        }

        let tokens: Vec<String> = layer
            .split('-')
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        structural_match(&tokens).unwrap_or_else(|| partial_match(layer))
    }
}

impl Default for LayerClassifier {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Object kind a classification points at, if any
pub fn resolved_kind(result: &ClassificationResult) -> Option<ObjectKind> {
    result
        .object_type
        .as_deref()
        .and_then(|code| vocab::resolve_kind(result.category.as_deref(), code))
}

fn translate(rule: &PatternRule, raw: &str) -> String {
    let code = raw.trim().to_ascii_uppercase();
    rule.aliases
        .iter()
        .find(|(client_code, _)| client_code.eq_ignore_ascii_case(&code))
        .map(|(_, canonical)| canonical.to_ascii_uppercase())
        .unwrap_or(code)
}

fn from_rule(rule: &PatternRule, captures: &Captures<'_>) -> ClassificationResult {
    let mut result = ClassificationResult::unmatched();
    result.source = MatchSource::ClientRule { rule_id: rule.id.clone() };
    result.confidence = rule.confidence.clamp(0.0, 1.0);

    for (index, slot) in rule.slots.iter().enumerate() {
        let Some(group) = captures.get(index + 1) else {
            continue;
        };
        let code = translate(rule, group.as_str());
        if code.is_empty() {
            continue;
        }
        match slot {
            TokenSlot::Discipline => result.discipline = Some(code),
            TokenSlot::Category => result.category = Some(code),
            TokenSlot::ObjectType => result.object_type = Some(code),
            TokenSlot::Attribute => result.attributes.push(code),
            TokenSlot::Phase => result.phase = Phase::from_code(&code),
            TokenSlot::Geometry => result.geometry_kind = Some(code),
            TokenSlot::Ignore => {}
        }
    }

    for (slot, code) in &rule.defaults {
        let code = code.to_ascii_uppercase();
        match slot {
            TokenSlotKey::Discipline => {
                result.discipline.get_or_insert(code);
            }
            TokenSlotKey::Category => {
                result.category.get_or_insert(code);
            }
            TokenSlotKey::ObjectType => {
                result.object_type.get_or_insert(code);
            }
            TokenSlotKey::Geometry => {
                result.geometry_kind.get_or_insert(code);
            }
            TokenSlotKey::Phase => {
                if result.phase.is_none() {
                    result.phase = Phase::from_code(&code);
                }
            }
        }
    }

    result.suggested_object_type = suggestion(&result);
    result
}

fn suggestion(result: &ClassificationResult) -> Option<String> {
    resolved_kind(result)
        .or_else(|| result.object_type.as_deref().and_then(vocab::kind_for_type))
        .or_else(|| result.category.as_deref().and_then(vocab::category_default_kind))
        .map(|kind| kind.as_str().to_string())
}

fn structural_match(tokens: &[String]) -> Option<ClassificationResult> {
    let [discipline, category, object_type, rest @ ..] = tokens else {
        return None;
    };
    if !vocab::is_discipline(discipline) || !vocab::is_category(category) {
        return None;
    }
    let kind = vocab::resolve_kind(Some(category.as_str()), object_type)?;

    let mut rest = rest;
    let mut deviations = 0;

    let geometry_kind = match rest.split_last() {
        Some((last, head)) if vocab::is_geometry_token(last) => {
            rest = head;
            Some(last.clone())
        }
        _ => {
            deviations += 1;
            None
        }
    };

    let phase = match rest.split_last() {
        Some((last, head)) => match Phase::from_code(last) {
            Some(phase) => {
                rest = head;
                Some(phase)
            }
            None => None,
        },
        None => None,
    };
    if phase.is_none() {
        deviations += 1;
    }

    if rest.iter().any(|token| !vocab::is_known_attribute(token)) {
        deviations += 1;
    }

    Some(ClassificationResult {
        discipline: Some(discipline.clone()),
        category: Some(category.clone()),
        object_type: Some(object_type.clone()),
        attributes: rest.to_vec(),
        phase,
        geometry_kind,
        confidence: DEVIATION_CONFIDENCE[deviations],
        source: MatchSource::Canonical,
        suggested_object_type: Some(kind.as_str().to_string()),
    })
}

fn partial_match(layer: &str) -> ClassificationResult {
    let tokens: Vec<String> = layer
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
        .map(|t| t.to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .collect();

    let find = |pred: fn(&str) -> bool| tokens.iter().find(|t| pred(t)).cloned();

    let mut result = ClassificationResult::unmatched();
    result.discipline = find(vocab::is_discipline);
    result.category = find(vocab::is_category);
    result.object_type = tokens.iter().find(|t| vocab::kind_for_type(t).is_some()).cloned();
    result.phase = tokens.iter().find_map(|t| Phase::from_code(t));
    result.geometry_kind = find(vocab::is_geometry_token);
    result.attributes = tokens.iter().filter(|t| vocab::is_known_attribute(t)).cloned().collect();

    if result.object_type.is_some() {
        result.confidence = TYPE_CODE_CONFIDENCE;
    } else if result.discipline.is_some() || result.category.is_some() {
        result.confidence = CODE_ONLY_CONFIDENCE;
    } else {
        return ClassificationResult::unmatched();
    }

    result.source = MatchSource::Partial;
    result.suggested_object_type = suggestion(&result);
    result
}
