//! CadSync Core - Domain models, drawing formats, and configuration
//!
//! This crate holds the types shared by the sync engine, its storage adapters
//! and the operational surfaces.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

pub use error::{CadSyncError, Result};
