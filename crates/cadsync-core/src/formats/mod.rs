//! Drawing format abstraction
//!
//! Each readable format implements [`DrawingReader`]. The [`FormatRegistry`]
//! picks a reader from the file extension, for paths on disk as well as for
//! uploaded files that only carry a name.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{CadSyncError, Result};
use crate::models::{Geometry, ParsedDrawing};

pub mod dxf;
pub mod json;

pub use self::dxf::{DxfReader, DxfWriter};
pub use self::json::JsonReader;

/// Reader trait implemented by every drawing format
#[async_trait]
pub trait DrawingReader: Send + Sync {
    /// Parse an in-memory drawing
    ///
    /// Entities the reader cannot map are returned as parse issues rather
    /// than failing the whole file.
    fn parse(&self, source_name: &str, bytes: &[u8]) -> Result<ParsedDrawing>;

    /// Supported file extensions, lowercase without the dot
    fn supported_extensions(&self) -> &[&str];

    /// Human-readable format name
    fn format_name(&self) -> &str;

    /// Read and parse a drawing from disk
    async fn read(&self, path: &Path) -> Result<ParsedDrawing> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed");
        self.parse(name, &bytes)
    }
}

/// One entity to be written by a drawing writer
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntity {
    pub layer: String,
    pub geometry: Geometry,
    /// AutoCAD color index, BYLAYER when unset
    pub color: Option<i16>,
}

impl OutputEntity {
    pub fn new(layer: impl Into<String>, geometry: Geometry) -> Self {
        Self { layer: layer.into(), geometry, color: None }
    }
}

/// Registry of drawing readers keyed by extension
pub struct FormatRegistry {
    readers: Vec<Box<dyn DrawingReader>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { readers: Vec::new() }
    }

    /// Registry with the DXF and JSON interchange readers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DxfReader));
        registry.register(Box::new(JsonReader));
        registry
    }

    pub fn register(&mut self, reader: Box<dyn DrawingReader>) {
        self.readers.push(reader);
    }

    /// Find the reader for a path on disk
    pub fn detect_format(&self, path: &Path) -> Result<&dyn DrawingReader> {
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        self.detect_by_name(name)
    }

    /// Find the reader for a bare file name
    pub fn detect_by_name(&self, name: &str) -> Result<&dyn DrawingReader> {
        let extension = match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => {
                return Err(CadSyncError::UnsupportedFormat(format!(
                    "'{}' has no extension (supported: {})",
                    name,
                    self.supported_formats().join(", ")
                )))
            }
        };

        self.readers
            .iter()
            .find(|r| r.supported_extensions().contains(&extension.as_str()))
            .map(|r| r.as_ref())
            .ok_or_else(|| {
                CadSyncError::UnsupportedFormat(format!(
                    ".{} (supported: {})",
                    extension,
                    self.supported_formats().join(", ")
                ))
            })
    }

    /// Parse uploaded bytes, choosing the reader from the file name
    pub fn parse(&self, name: &str, bytes: &[u8]) -> Result<ParsedDrawing> {
        self.detect_by_name(name)?.parse(name, bytes)
    }

    /// Read a drawing from disk with the matching reader
    pub async fn read(&self, path: &Path) -> Result<ParsedDrawing> {
        self.detect_format(path)?.read(path).await
    }

    pub fn supported_formats(&self) -> Vec<String> {
        self.readers
            .iter()
            .flat_map(|r| r.supported_extensions())
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
