//! Shared Domain Types
//!
//! Value objects, request context, and errors shared across bounded contexts.

pub mod context;
pub mod errors;
pub mod value_objects;

pub use context::RequestContext;
pub use errors::{CancelReason, CancelledError};
pub use value_objects::{ProductId, PurchaseId, UserId};
