//! Conversions to the `geo` crate and derived measurements.
//!
//! `geo` works in 2-D; the elevation ordinate is dropped on conversion and
//! handled separately where a measurement needs it.

use geo::{Area, Centroid, Geometry as GeoGeometry};

pub use cadsync_core::models::{Crs, Geometry, GeometryType};

fn to_coord(c: &[f64; 3]) -> geo::Coord {
    geo::Coord { x: c[0], y: c[1] }
}

/// Convert a canonical Geometry to a 2-D geo::Geometry
pub fn to_geo_geometry(geom: &Geometry) -> GeoGeometry {
    match geom {
        Geometry::Point { coordinates } => {
            GeoGeometry::Point(geo::Point::new(coordinates[0], coordinates[1]))
        }
        Geometry::LineString { coordinates } => GeoGeometry::LineString(geo::LineString::new(
            coordinates.iter().map(to_coord).collect(),
        )),
        Geometry::Polygon { coordinates } => {
            let mut rings = coordinates
                .iter()
                .map(|ring| geo::LineString::new(ring.iter().map(to_coord).collect()));
            let exterior = rings.next().unwrap_or_else(|| geo::LineString::new(vec![]));
            GeoGeometry::Polygon(geo::Polygon::new(exterior, rings.collect()))
        }
    }
}

/// Measurements used to populate typed object fields
pub trait GeometryExt {
    /// Convert to geo::Geometry
    fn to_geo(&self) -> GeoGeometry;

    /// Slope length along the path, including elevation change
    fn length_3d(&self) -> f64;

    /// Plan area of a polygon, `None` for other shapes
    fn plan_area(&self) -> Option<f64>;

    /// Elevation of a point geometry
    fn elevation(&self) -> Option<f64>;

    fn centroid_coords(&self) -> Option<[f64; 2]>;
}

impl GeometryExt for Geometry {
    fn to_geo(&self) -> GeoGeometry {
        to_geo_geometry(self)
    }

    fn length_3d(&self) -> f64 {
        match self {
            Geometry::Point { .. } => 0.0,
            Geometry::LineString { coordinates } => path_length(coordinates),
            Geometry::Polygon { coordinates } => {
                coordinates.first().map(|ring| path_length(ring)).unwrap_or(0.0)
            }
        }
    }

    fn plan_area(&self) -> Option<f64> {
        match self {
            Geometry::Polygon { .. } => Some(self.to_geo().unsigned_area()),
            _ => None,
        }
    }

    fn elevation(&self) -> Option<f64> {
        match self {
            Geometry::Point { coordinates } => Some(coordinates[2]),
            _ => None,
        }
    }

    fn centroid_coords(&self) -> Option<[f64; 2]> {
        self.to_geo().centroid().map(|p| [p.x(), p.y()])
    }
}

fn path_length(coords: &[[f64; 3]]) -> f64 {
    coords
        .windows(2)
        .map(|w| {
            let (dx, dy, dz) = (w[1][0] - w[0][0], w[1][1] - w[0][1], w[1][2] - w[0][2]);
            (dx * dx + dy * dy + dz * dz).sqrt()
        })
        .sum()
}
