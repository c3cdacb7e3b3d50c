//! Domain Layer
//!
//! The innermost layer containing business logic with no transport or
//! storage dependencies. This layer defines:
//!
//! - **Aggregates**: `Product` and its purchase records
//! - **Value Objects**: identifiers, pages, stock results
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`catalog`]: Product CRUD, stock quantity, purchases

pub mod catalog;
pub mod shared;
