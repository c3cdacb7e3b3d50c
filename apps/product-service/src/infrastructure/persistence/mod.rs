//! Persistence Adapters
//!
//! Store implementations of `ProductRepository`:
//!
//! - [`sql`]: SQLite through `SQLx`
//! - [`document`]: embedded JSON document store with optional snapshots

pub mod document;
pub mod sql;

pub use document::{DocumentProductRepository, DocumentStore};
pub use sql::SqlProductRepository;
