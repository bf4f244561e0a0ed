//! CadSync Geo - Geometry hashing, validation, and CRS transforms
//!
//! Everything here is synchronous and side-effect free so the pipelines can
//! call it per entity.

pub mod hash;
pub mod models;
pub mod transform;
pub mod validation;

pub use hash::GeometryHasher;
pub use models::GeometryExt;
pub use transform::CoordinateTransformer;
