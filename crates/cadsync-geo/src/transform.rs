//! CRS transformation between drawing and real-world coordinates
//!
//! Horizontal ordinates go through PROJ; elevations pass through unchanged.
//! SRID 0 is the drawing's native space and only becomes transformable when
//! the project declares which real-world CRS it corresponds to.

use proj::Proj;

use cadsync_core::config::DEFAULT_TRANSFORM_TOLERANCE;
use cadsync_core::error::{CadSyncError, Result};
use cadsync_core::models::{Crs, Geometry};

#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    tolerance: f64,
    georeference: Option<Crs>,
}

impl Default for CoordinateTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFORM_TOLERANCE)
    }
}

impl CoordinateTransformer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance, georeference: None }
    }

    /// Declare the real-world CRS that SRID 0 coordinates are in
    pub fn with_georeference(mut self, georeference: Option<Crs>) -> Self {
        self.georeference = georeference.filter(|crs| !crs.is_local());
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn georeference(&self) -> Option<&Crs> {
        self.georeference.as_ref()
    }

    /// Transform a geometry from one CRS to another
    pub fn transform(&self, geometry: &Geometry, from: &Crs, to: &Crs) -> Result<Geometry> {
        if from.srid == to.srid {
            return Ok(geometry.clone());
        }

        let source = self.resolve(from, from, to)?;
        let target = self.resolve(to, from, to)?;
        if source == target {
            return Ok(geometry.clone());
        }

        let from_proj = format!("EPSG:{}", source);
        let to_proj = format!("EPSG:{}", target);
        let proj = Proj::new_known_crs(&from_proj, &to_proj, None).map_err(|e| {
            CadSyncError::TransformUnsupported {
                from: from.srid,
                to: to.srid,
                reason: format!("Failed to create projection from {} to {}: {}", from_proj, to_proj, e),
            }
        })?;

        geometry.try_map_coords(|c| {
            proj.convert((c[0], c[1]))
                .map(|(x, y)| [x, y, c[2]])
                .map_err(|e| CadSyncError::TransformUnsupported {
                    from: from.srid,
                    to: to.srid,
                    reason: format!("Projection failed: {}", e),
                })
        })
    }

    /// Transform there and back, failing when any vertex drifts more than
    /// the tolerance. Returns the largest drift, in source units.
    pub fn verify_round_trip(&self, geometry: &Geometry, a: &Crs, b: &Crs) -> Result<f64> {
        let forward = self.transform(geometry, a, b)?;
        let back = self.transform(&forward, b, a)?;

        let max_error = geometry
            .coords()
            .zip(back.coords())
            .map(|(p, q)| {
                let (dx, dy, dz) = (p[0] - q[0], p[1] - q[1], p[2] - q[2]);
                (dx * dx + dy * dy + dz * dz).sqrt()
            })
            .fold(0.0, f64::max);

        if !(max_error <= self.tolerance) {
            return Err(CadSyncError::TransformOutOfTolerance {
                from: a.srid,
                to: b.srid,
                error: max_error,
                tolerance: self.tolerance,
            });
        }

        tracing::trace!(from = a.srid, to = b.srid, max_error, "Round trip within tolerance");
        Ok(max_error)
    }

    fn resolve(&self, crs: &Crs, from: &Crs, to: &Crs) -> Result<u32> {
        if !crs.is_local() {
            return Ok(crs.srid);
        }
        self.georeference
            .as_ref()
            .map(|g| g.srid)
            .ok_or_else(|| CadSyncError::TransformUnsupported {
                from: from.srid,
                to: to.srid,
                reason: "local coordinates have no declared georeference".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_crs_is_noop() {
        let transformer = CoordinateTransformer::default();
        let geometry = Geometry::point(6012345.25, 2101234.5, 100.0);

        let out = transformer.transform(&geometry, &Crs::local(), &Crs::local()).unwrap();
        assert_eq!(out, geometry);

        let out = transformer.transform(&geometry, &Crs::epsg(2226), &Crs::epsg(2226)).unwrap();
        assert_eq!(out, geometry);
    }

    #[test]
    fn test_local_without_georeference_is_unsupported() {
        let transformer = CoordinateTransformer::default();
        let geometry = Geometry::point(1.0, 2.0, 3.0);

        let err = transformer.transform(&geometry, &Crs::local(), &Crs::wgs84()).unwrap_err();
        assert!(matches!(err, CadSyncError::TransformUnsupported { from: 0, to: 4326, .. }));

        let err = transformer.transform(&geometry, &Crs::wgs84(), &Crs::local()).unwrap_err();
        assert!(matches!(err, CadSyncError::TransformUnsupported { .. }));
    }

    #[test]
    fn test_local_resolves_to_georeference() {
        let transformer =
            CoordinateTransformer::default().with_georeference(Some(Crs::epsg(2226)));
        let geometry = Geometry::point(6012345.25, 2101234.5, 100.0);

        // Local and its georeference are the same space
        let out = transformer.transform(&geometry, &Crs::local(), &Crs::epsg(2226)).unwrap();
        assert_eq!(out, geometry);
    }

    #[test]
    fn test_local_georeference_is_ignored() {
        let transformer = CoordinateTransformer::default().with_georeference(Some(Crs::local()));
        assert!(transformer.georeference().is_none());
    }
}
