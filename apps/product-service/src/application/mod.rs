//! Application Layer
//!
//! The application layer orchestrates domain logic for the catalog.
//! It defines:
//!
//! - **Services**: the product service driven by the HTTP layer
//! - **Retry**: backoff policy for idempotent store reads

pub mod retry;
pub mod services;

pub use retry::{Backoff, RetryPolicy};
pub use services::*;
