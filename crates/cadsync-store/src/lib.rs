//! CadSync Store - Storage ports and adapters
//!
//! This crate defines the persistence ports used by the sync engine and
//! provides an in-memory adapter and a PostgreSQL/PostGIS adapter.

pub mod memory;
pub mod ports;
pub mod postgres;

pub use memory::MemoryStore;
pub use ports::{
    CadStore, LinkStore, ObjectStore, ReferenceSeed, ReferenceStore, Transactional, UnitOfWork,
};
pub use postgres::PostgresStore;
