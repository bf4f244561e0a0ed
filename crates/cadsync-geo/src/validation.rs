use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::Geometry;

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// All error reasons joined for a one-line report
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate a geometry before it is hashed or persisted
pub fn validate_geometry(geometry: &Geometry) -> ValidationResult {
    let mut result = ValidationResult::valid();

    for (i, c) in geometry.coords().enumerate() {
        if !c.iter().all(|v| v.is_finite()) {
            result.add_error(format!("vertex[{}]", i), "Coordinates must be finite".to_string());
        }
    }
    if !result.is_valid {
        return result;
    }

    match geometry {
        Geometry::Point { .. } => {}
        Geometry::LineString { coordinates } => validate_path(&mut result, "LineString", coordinates),
        Geometry::Polygon { coordinates } => {
            if coordinates.is_empty() {
                result.add_error("Polygon".to_string(), "Polygon has no rings".to_string());
            }
            for (i, ring) in coordinates.iter().enumerate() {
                validate_ring(&mut result, i, ring);
            }
        }
    }

    result
}

/// Validate and convert failures into a per-entity error
pub fn ensure_valid(handle: &str, geometry: &Geometry) -> Result<()> {
    let result = validate_geometry(geometry);
    if result.is_valid {
        Ok(())
    } else {
        Err(CadSyncError::GeometryInvalid {
            handle: handle.to_string(),
            reason: result.summary(),
        })
    }
}

fn validate_path(result: &mut ValidationResult, location: &str, coords: &[[f64; 3]]) {
    if coords.len() < 2 {
        result.add_error(
            location.to_string(),
            format!("{} must have at least 2 points, found {}", location, coords.len()),
        );
        return;
    }

    if coords.iter().all(|c| *c == coords[0]) {
        result.add_error(location.to_string(), "Zero-length path".to_string());
    }
}

fn validate_ring(result: &mut ValidationResult, index: usize, ring: &[[f64; 3]]) {
    let location = format!("Polygon ring[{}]", index);

    if ring.len() < 4 {
        result.add_error(
            location,
            format!("Ring must have at least 4 points, found {}", ring.len()),
        );
        return;
    }

    if ring.first() != ring.last() {
        result.add_error(location, "Ring is not closed".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_geometries() {
        assert!(validate_geometry(&Geometry::point(1.0, 2.0, 3.0)).is_valid);
        assert!(validate_geometry(&Geometry::line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0])).is_valid);
        assert!(
            validate_geometry(&Geometry::polygon(vec![vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
            ]]))
            .is_valid
        );
    }

    #[test]
    fn test_non_finite_coordinates() {
        let result = validate_geometry(&Geometry::point(f64::NAN, 0.0, 0.0));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].location, "vertex[0]");
    }

    #[test]
    fn test_degenerate_lines() {
        assert!(!validate_geometry(&Geometry::line_string(vec![[0.0, 0.0, 0.0]])).is_valid);
        assert!(!validate_geometry(&Geometry::line([5.0, 5.0, 1.0], [5.0, 5.0, 1.0])).is_valid);
        // Vertical pipe segments are not zero length
        assert!(validate_geometry(&Geometry::line([5.0, 5.0, 1.0], [5.0, 5.0, 2.0])).is_valid);
    }

    #[test]
    fn test_open_or_short_rings() {
        let open = Geometry::polygon(vec![vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]]);
        assert!(!validate_geometry(&open).is_valid);

        let short = Geometry::polygon(vec![vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]]]);
        assert!(!validate_geometry(&short).is_valid);
        assert!(!validate_geometry(&Geometry::polygon(vec![])).is_valid);
    }

    #[test]
    fn test_ensure_valid_names_handle() {
        let err = ensure_valid("2F", &Geometry::line_string(vec![])).unwrap_err();
        match err {
            CadSyncError::GeometryInvalid { handle, reason } => {
                assert_eq!(handle, "2F");
                assert!(reason.contains("at least 2 points"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
