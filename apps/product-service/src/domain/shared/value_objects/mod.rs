//! Shared value objects.

mod identifiers;

pub use identifiers::{ProductId, PurchaseId, UserId};
