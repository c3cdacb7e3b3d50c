//! Embedded document-store persistence.

mod repository;
mod store;

pub use repository::DocumentProductRepository;
pub use store::{
    Collections, Document, DocumentStore, DocumentStoreError, Filter, FindOptions, ID_FIELD,
    Update,
};
