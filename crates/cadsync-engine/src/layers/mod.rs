//! Layer name classification and generation

pub mod classifier;
pub mod generator;
pub mod vocabulary;

pub use classifier::{resolved_kind, LayerClassifier};
pub use generator::{LayerGenerator, LayerParts};
