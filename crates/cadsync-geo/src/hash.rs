//! Deterministic geometry fingerprints
//!
//! A geometry is written as WKT with an explicit Z ordinate, every ordinate
//! rounded to a fixed number of decimals, and hashed with SHA-256. The hash is
//! the only signal reimport uses to tell unchanged entities from modified ones.

use sha2::{Digest, Sha256};
use std::fmt::Write;

use cadsync_core::config::DEFAULT_HASH_PRECISION;
use cadsync_core::models::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryHasher {
    precision: u32,
}

impl Default for GeometryHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_PRECISION)
    }
}

impl GeometryHasher {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Lowercase hex SHA-256 of the canonical text (64 characters)
    pub fn hash(&self, geometry: &Geometry) -> String {
        let digest = Sha256::digest(self.canonical_wkt(geometry).as_bytes());
        hex::encode(digest)
    }

    /// Canonical WKT Z representation
    pub fn canonical_wkt(&self, geometry: &Geometry) -> String {
        let mut out = String::new();
        match geometry {
            Geometry::Point { coordinates } => {
                out.push_str("POINT Z (");
                self.write_position(&mut out, coordinates);
                out.push(')');
            }
            Geometry::LineString { coordinates } => {
                out.push_str("LINESTRING Z ");
                self.write_sequence(&mut out, coordinates);
            }
            Geometry::Polygon { coordinates } => {
                out.push_str("POLYGON Z (");
                for (i, ring) in coordinates.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_sequence(&mut out, ring);
                }
                out.push(')');
            }
        }
        out
    }

    fn write_sequence(&self, out: &mut String, coords: &[[f64; 3]]) {
        out.push('(');
        for (i, c) in coords.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_position(out, c);
        }
        out.push(')');
    }

    fn write_position(&self, out: &mut String, c: &[f64; 3]) {
        let p = self.precision as usize;
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{:.*} {:.*} {:.*}",
            p,
            self.round(c[0]),
            p,
            self.round(c[1]),
            p,
            self.round(c[2])
        );
    }

    fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        let rounded = (value * scale).round() / scale;
        // -0.0 and 0.0 must hash the same
        if rounded == 0.0 {
            0.0
        } else {
            rounded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_text() {
        let hasher = GeometryHasher::new(3);
        let line = Geometry::line([0.0, 0.0, 0.0], [100.0, 0.5, -0.0]);
        assert_eq!(
            hasher.canonical_wkt(&line),
            "LINESTRING Z (0.000 0.000 0.000, 100.000 0.500 0.000)"
        );

        let point = Geometry::point(1.23456, -0.0000001, 2.0);
        assert_eq!(hasher.canonical_wkt(&point), "POINT Z (1.235 0.000 2.000)");

        let polygon = Geometry::polygon(vec![vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]]);
        assert!(hasher.canonical_wkt(&polygon).starts_with("POLYGON Z (("));
    }

    #[test]
    fn test_hash_format() {
        let hash = GeometryHasher::default().hash(&Geometry::point(0.0, 0.0, 0.0));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let hasher = GeometryHasher::default();
        assert_eq!(
            hasher.hash(&Geometry::point(-0.0, 0.0, -0.0)),
            hasher.hash(&Geometry::point(0.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_elevation_change_is_detected() {
        let hasher = GeometryHasher::default();
        assert_ne!(
            hasher.hash(&Geometry::point(10.0, 10.0, 100.0)),
            hasher.hash(&Geometry::point(10.0, 10.0, 100.01))
        );
    }

    #[test]
    fn test_shape_matters() {
        let hasher = GeometryHasher::default();
        let coords = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        assert_ne!(
            hasher.hash(&Geometry::line_string(coords.clone())),
            hasher.hash(&Geometry::polygon(vec![coords]))
        );
    }

    proptest! {
        #[test]
        fn prop_hash_is_stable(
            x in -1.0e7f64..1.0e7,
            y in -1.0e7f64..1.0e7,
            z in -1.0e4f64..1.0e4,
        ) {
            let hasher = GeometryHasher::default();
            let geometry = Geometry::line([x, y, z], [x + 10.0, y, z]);
            prop_assert_eq!(hasher.hash(&geometry), hasher.hash(&geometry.clone()));
        }

        #[test]
        fn prop_sub_precision_noise_is_ignored(
            x in -1.0e6f64..1.0e6,
            y in -1.0e6f64..1.0e6,
        ) {
            let hasher = GeometryHasher::new(3);
            // Snap to the middle of a rounding bucket so the noise cannot cross it
            let x = (x * 1000.0).round() / 1000.0;
            let y = (y * 1000.0).round() / 1000.0;
            let a = Geometry::point(x, y, 0.0);
            let b = Geometry::point(x + 1.0e-7, y - 1.0e-7, 0.0);
            prop_assert_eq!(hasher.hash(&a), hasher.hash(&b));
        }
    }
}
