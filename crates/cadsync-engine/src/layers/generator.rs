//! Layer names for export, the inverse of the classifier

use cadsync_core::models::{CanonicalObject, ObjectAttributes};
use std::collections::HashMap;

use super::vocabulary as vocab;

/// Layer fields recovered from a canonical object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerParts {
    pub discipline: String,
    pub category: String,
    pub object_type: String,
    pub attributes: Vec<String>,
    pub phase: Option<String>,
    pub geometry: String,
}

impl LayerParts {
    /// `None` for generic objects and typed objects with an empty type code
    pub fn from_object(object: &CanonicalObject) -> Option<Self> {
        let kind = object.kind();
        let category = vocab::canonical_category(kind)?;

        let (object_type, attributes) = match &object.attributes {
            ObjectAttributes::UtilityLine(line) => {
                let mut attributes = Vec::new();
                if let Some(diameter) = line.diameter_in {
                    attributes.push(vocab::format_diameter(diameter));
                }
                if let Some(material) = &line.material {
                    attributes.push(material.to_ascii_uppercase());
                }
                (line.system.clone(), attributes)
            }
            ObjectAttributes::UtilityStructure(s) => (s.structure_type.clone(), Vec::new()),
            ObjectAttributes::Bmp(bmp) => (bmp.bmp_type.clone(), Vec::new()),
            ObjectAttributes::Alignment(a) => (a.alignment_type.clone(), Vec::new()),
            ObjectAttributes::SurveyPoint(p) => (p.point_type.clone(), Vec::new()),
            ObjectAttributes::Generic(_) => return None,
        };

        let object_type = object_type.trim().to_ascii_uppercase();
        if object_type.is_empty() {
            return None;
        }

        let discipline = object
            .discipline
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| vocab::default_discipline(kind).to_string());

        Some(Self {
            discipline,
            category: category.to_string(),
            object_type,
            attributes,
            phase: object.phase.map(|p| p.code().to_string()),
            geometry: vocab::geometry_token(object.geometry.geometry_type()).to_string(),
        })
    }

    /// `DISCIPLINE-CATEGORY-TYPE[-ATTRIBUTE...][-PHASE]-GEOMETRY`
    pub fn canonical_name(&self) -> String {
        let mut tokens = vec![
            self.discipline.as_str(),
            self.category.as_str(),
            self.object_type.as_str(),
        ];
        tokens.extend(self.attributes.iter().map(String::as_str));
        if let Some(phase) = &self.phase {
            tokens.push(phase);
        }
        tokens.push(&self.geometry);
        tokens.join("-")
    }

    /// Fill a client template
    ///
    /// Placeholders are `{discipline}`, `{category}`, `{type}`,
    /// `{attributes}`, `{phase}` and `{geometry}`. Canonical codes are written
    /// back in the client's vocabulary through `reverse_aliases`. Separators
    /// left dangling by empty placeholders are collapsed.
    pub fn render_template(&self, template: &str, reverse_aliases: &HashMap<String, String>) -> String {
        let client = |code: &str| -> String {
            reverse_aliases.get(code).cloned().unwrap_or_else(|| code.to_string())
        };

        let attributes: Vec<String> = self.attributes.iter().map(|a| client(a)).collect();
        let rendered = template
            .replace("{discipline}", &client(&self.discipline))
            .replace("{category}", &client(&self.category))
            .replace("{type}", &client(&self.object_type))
            .replace("{attributes}", &attributes.join("-"))
            .replace("{phase}", &self.phase.as_deref().map(client).unwrap_or_default())
            .replace("{geometry}", &client(&self.geometry));

        collapse_separators(&rendered)
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '_' | ' ' | '.')
}

fn collapse_separators(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending: Option<char> = None;

    for c in name.chars() {
        if is_separator(c) {
            pending.get_or_insert(c);
            continue;
        }
        if let Some(sep) = pending.take() {
            if !out.is_empty() {
                out.push(sep);
            }
        }
        out.push(c);
    }
    out
}

/// Generates export layer names
#[derive(Debug, Clone, Default)]
pub struct LayerGenerator {
    template: Option<String>,
    reverse_aliases: HashMap<String, String>,
}

impl LayerGenerator {
    /// Canonical grammar names
    pub fn canonical() -> Self {
        Self::default()
    }

    /// Client template names
    ///
    /// `aliases` maps client codes to canonical codes, as stored on pattern
    /// rules. The first client code seen for a canonical code wins.
    pub fn client_template<'a>(
        template: impl Into<String>,
        aliases: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        let mut reverse_aliases = HashMap::new();
        for (client_code, canonical) in aliases {
            reverse_aliases
                .entry(canonical.to_ascii_uppercase())
                .or_insert_with(|| client_code.to_ascii_uppercase());
        }
        Self { template: Some(template.into()), reverse_aliases }
    }

    /// Layer for an object, `None` when the object has no resolvable fields
    pub fn layer_for(&self, object: &CanonicalObject) -> Option<String> {
        let parts = LayerParts::from_object(object)?;
        let name = match &self.template {
            Some(template) => parts.render_template(template, &self.reverse_aliases),
            None => parts.canonical_name(),
        };
        (!name.is_empty()).then_some(name)
    }
}
