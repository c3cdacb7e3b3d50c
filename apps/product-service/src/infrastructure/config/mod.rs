//! Composition root helpers.

mod container;

pub use container::{Container, open_document, open_sqlite};
