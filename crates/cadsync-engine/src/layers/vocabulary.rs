//! Canonical layer-name codes

use cadsync_core::models::{GeometryType, ObjectKind};
use regex::Regex;
use std::sync::OnceLock;

pub const DISCIPLINES: &[&str] = &["CIV", "SITE", "SURV", "LAND", "ELEC", "MECH"];

pub const UTILITY_SYSTEMS: &[&str] = &[
    "STORM", "SANIT", "SEWER", "WATER", "GAS", "ELEC", "TELE", "RECL", "FIRE",
];

pub const UTILITY_STRUCTURES: &[&str] =
    &["MH", "CB", "INLET", "VALVE", "HYD", "CO", "JB", "METER", "POLE"];

pub const BMP_TYPES: &[&str] = &["BIOR", "SWALE", "POND", "INFIL", "PERVP", "FILTER", "CISTRN"];

pub const ALIGNMENT_TYPES: &[&str] = &["CL", "ALIGN", "BASELN"];

pub const SURVEY_TYPES: &[&str] = &["MON", "BM", "CP", "TOPO", "SHOT"];

pub const MATERIALS: &[&str] = &["PVC", "RCP", "DIP", "HDPE", "VCP", "CMP", "CI", "AC", "STL", "CONC"];

pub const GEOMETRY_TOKENS: &[&str] = &["LN", "PL", "PG", "PT", "BLK", "TX"];

const MM_PER_INCH: f64 = 25.4;

/// Object category and the type codes it admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub code: &'static str,
    pub kinds: &'static [ObjectKind],
}

pub const CATEGORIES: &[Category] = &[
    Category { code: "UTIL", kinds: &[ObjectKind::UtilityLine, ObjectKind::UtilityStructure] },
    Category { code: "STRM", kinds: &[ObjectKind::Bmp] },
    Category { code: "ROAD", kinds: &[ObjectKind::Alignment] },
    Category { code: "ALGN", kinds: &[ObjectKind::Alignment] },
    Category { code: "CTRL", kinds: &[ObjectKind::SurveyPoint] },
];

pub fn is_discipline(code: &str) -> bool {
    DISCIPLINES.contains(&code)
}

pub fn category(code: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.code == code)
}

pub fn is_category(code: &str) -> bool {
    category(code).is_some()
}

pub fn is_material(code: &str) -> bool {
    MATERIALS.contains(&code)
}

pub fn is_geometry_token(code: &str) -> bool {
    GEOMETRY_TOKENS.contains(&code)
}

/// Object kind named by a type code, regardless of category
pub fn kind_for_type(code: &str) -> Option<ObjectKind> {
    if UTILITY_SYSTEMS.contains(&code) {
        Some(ObjectKind::UtilityLine)
    } else if UTILITY_STRUCTURES.contains(&code) {
        Some(ObjectKind::UtilityStructure)
    } else if BMP_TYPES.contains(&code) {
        Some(ObjectKind::Bmp)
    } else if ALIGNMENT_TYPES.contains(&code) {
        Some(ObjectKind::Alignment)
    } else if SURVEY_TYPES.contains(&code) {
        Some(ObjectKind::SurveyPoint)
    } else {
        None
    }
}

/// Object kind for a category/type pair, `None` when they disagree
pub fn resolve_kind(category_code: Option<&str>, type_code: &str) -> Option<ObjectKind> {
    let kind = kind_for_type(type_code)?;
    match category_code.map(category) {
        Some(Some(category)) if !category.kinds.contains(&kind) => None,
        _ => Some(kind),
    }
}

/// Kind a category suggests when no type code was recognized
pub fn category_default_kind(code: &str) -> Option<ObjectKind> {
    category(code).and_then(|c| c.kinds.first().copied())
}

/// Category written for an object kind on export
pub fn canonical_category(kind: ObjectKind) -> Option<&'static str> {
    match kind {
        ObjectKind::UtilityLine | ObjectKind::UtilityStructure => Some("UTIL"),
        ObjectKind::Bmp => Some("STRM"),
        ObjectKind::Alignment => Some("ALGN"),
        ObjectKind::SurveyPoint => Some("CTRL"),
        ObjectKind::Generic => None,
    }
}

/// Discipline written when an object carries none
pub fn default_discipline(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::SurveyPoint => "SURV",
        _ => "CIV",
    }
}

/// Geometry token written for a stored geometry
pub fn geometry_token(geometry: GeometryType) -> &'static str {
    match geometry {
        GeometryType::Point => "PT",
        GeometryType::LineString => "LN",
        GeometryType::Polygon => "PG",
    }
}

/// Whether a kind can be built from a geometry shape
pub fn accepts_geometry(kind: ObjectKind, geometry: GeometryType) -> bool {
    match kind {
        ObjectKind::UtilityLine | ObjectKind::Alignment => geometry == GeometryType::LineString,
        ObjectKind::UtilityStructure => {
            matches!(geometry, GeometryType::Point | GeometryType::Polygon)
        }
        ObjectKind::Bmp => matches!(geometry, GeometryType::Polygon | GeometryType::LineString),
        ObjectKind::SurveyPoint => geometry == GeometryType::Point,
        ObjectKind::Generic => true,
    }
}

fn diameter_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)?)(IN|MM)$").ok())
        .as_ref()
}

/// Diameter in inches from a token like `12IN` or `300MM`
pub fn parse_diameter(token: &str) -> Option<f64> {
    let captures = diameter_pattern()?.captures(token)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    match captures.get(2)?.as_str() {
        "MM" => Some(value / MM_PER_INCH),
        _ => Some(value),
    }
}

/// Token written for a diameter, whole inches without a fraction
pub fn format_diameter(inches: f64) -> String {
    if (inches - inches.round()).abs() < 1e-9 {
        format!("{}IN", inches.round() as i64)
    } else {
        let text = format!("{:.2}", inches);
        format!("{}IN", text.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// An attribute token the grammar understands
///
/// Utility systems are accepted so structures can name the network they
/// sit on, e.g. `CIV-UTIL-MH-STORM-EXIST-BLK`.
pub fn is_known_attribute(token: &str) -> bool {
    parse_diameter(token).is_some() || is_material(token) || UTILITY_SYSTEMS.contains(&token)
}
