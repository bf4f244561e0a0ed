//! Canonical geometry types used across all cadsync crates.
//!
//! Coordinates always carry an elevation ordinate. Drawings without Z are read
//! with `z = 0.0` so that hashing and export see one shape of data.

use serde::{Deserialize, Serialize};

/// Spatial reference system identified by SRID.
///
/// SRID 0 is the drawing's native, unprojected coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub srid: u32,
    pub name: String,
}

impl Default for Crs {
    fn default() -> Self {
        Self::local()
    }
}

impl Crs {
    pub fn new(srid: u32, name: impl Into<String>) -> Self {
        Self { srid, name: name.into() }
    }

    /// Unprojected drawing coordinates (SRID 0)
    pub fn local() -> Self {
        Self::new(0, "Local (unprojected)")
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326, "WGS 84")
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::new(3857, "Web Mercator")
    }

    /// Build a CRS from a bare EPSG code, naming it after the code
    pub fn epsg(srid: u32) -> Self {
        if srid == 0 {
            return Self::local();
        }
        Self::new(srid, format!("EPSG:{}", srid))
    }

    pub fn is_local(&self) -> bool {
        self.srid == 0
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_local() {
            write!(f, "SRID:0 ({})", self.name)
        } else {
            write!(f, "EPSG:{} ({})", self.srid, self.name)
        }
    }
}

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
}

/// GeoJSON-shaped geometry with XYZ coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 3] },
    LineString { coordinates: Vec<[f64; 3]> },
    Polygon { coordinates: Vec<Vec<[f64; 3]>> },
}

impl Geometry {
    pub fn point(x: f64, y: f64, z: f64) -> Self {
        Geometry::Point { coordinates: [x, y, z] }
    }

    pub fn line_string(coords: Vec<[f64; 3]>) -> Self {
        Geometry::LineString { coordinates: coords }
    }

    /// Two-vertex line
    pub fn line(start: [f64; 3], end: [f64; 3]) -> Self {
        Geometry::LineString { coordinates: vec![start, end] }
    }

    pub fn polygon(rings: Vec<Vec<[f64; 3]>>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::LineString { .. } => GeometryType::LineString,
            Geometry::Polygon { .. } => GeometryType::Polygon,
        }
    }

    /// Iterate over every vertex in the geometry
    pub fn coords(&self) -> Box<dyn Iterator<Item = &[f64; 3]> + '_> {
        match self {
            Geometry::Point { coordinates } => Box::new(std::iter::once(coordinates)),
            Geometry::LineString { coordinates } => Box::new(coordinates.iter()),
            Geometry::Polygon { coordinates } => Box::new(coordinates.iter().flatten()),
        }
    }

    /// Apply a function to every vertex, keeping the geometry shape
    pub fn map_coords<F>(&self, mut f: F) -> Geometry
    where
        F: FnMut(&[f64; 3]) -> [f64; 3],
    {
        match self {
            Geometry::Point { coordinates } => Geometry::Point { coordinates: f(coordinates) },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: coordinates.iter().map(&mut f).collect(),
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|ring| ring.iter().map(&mut f).collect())
                    .collect(),
            },
        }
    }

    /// Fallible variant of [`Geometry::map_coords`]
    pub fn try_map_coords<F, E>(&self, mut f: F) -> Result<Geometry, E>
    where
        F: FnMut(&[f64; 3]) -> Result<[f64; 3], E>,
    {
        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point { coordinates: f(coordinates)? },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: coordinates.iter().map(&mut f).collect::<Result<_, _>>()?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|ring| ring.iter().map(&mut f).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    /// Shift every vertex by the given offsets
    pub fn translate(&self, dx: f64, dy: f64, dz: f64) -> Geometry {
        self.map_coords(|c| [c[0] + dx, c[1] + dy, c[2] + dz])
    }

    pub fn vertex_count(&self) -> usize {
        self.coords().count()
    }

    pub fn from_geojson(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
