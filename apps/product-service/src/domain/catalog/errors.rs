//! Catalog Errors

use std::fmt;

use crate::domain::shared::{CancelReason, CancelledError, ProductId};

/// Errors returned by catalog operations.
///
/// Repository adapters return these unchanged through the application
/// service to the transport edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// No record matches the identifier.
    NotFound {
        /// Entity type.
        entity: String,
        /// Entity identifier.
        id: String,
    },

    /// The store rejected an insert, update, or delete.
    Write {
        /// Operation that failed.
        operation: String,
        /// Store message.
        message: String,
    },

    /// A stock debit could not be satisfied, so nothing was written.
    InsufficientStock {
        /// Product that was short.
        product_id: ProductId,
        /// Units requested.
        requested: i64,
        /// Units available at the time of the check.
        available: i64,
    },

    /// The request deadline passed or the caller cancelled.
    Cancelled {
        /// Operation that was interrupted.
        operation: String,
        /// Cancellation cause.
        reason: CancelReason,
    },

    /// Input rejected at the service boundary.
    Validation {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },

    /// Transient store failure (pool exhausted, I/O, store closed).
    Unavailable {
        /// Store message.
        message: String,
    },

    /// Non-transient read failure (decode error, malformed record).
    Storage {
        /// Operation that failed.
        operation: String,
        /// Store message.
        message: String,
    },
}

impl CatalogError {
    /// Product not found.
    #[must_use]
    pub fn product_not_found(id: ProductId) -> Self {
        Self::NotFound {
            entity: "Product".to_string(),
            id: id.to_string(),
        }
    }

    /// Validation failure for a field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Store write failure.
    #[must_use]
    pub fn write(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Non-transient read failure.
    #[must_use]
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Transient failure worth retrying for idempotent reads.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// True for [`CatalogError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Write { operation, message } => {
                write!(f, "Write failed during {operation}: {message}")
            }
            Self::InsufficientStock {
                product_id,
                requested,
                available,
            } => write!(
                f,
                "Insufficient stock for product {product_id}: requested {requested}, available {available}"
            ),
            Self::Cancelled { operation, reason } => {
                write!(f, "Request {reason} during {operation}")
            }
            Self::Validation { field, message } => {
                write!(f, "Invalid value for '{field}': {message}")
            }
            Self::Unavailable { message } => write!(f, "Store unavailable: {message}"),
            Self::Storage { operation, message } => {
                write!(f, "Store error during {operation}: {message}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<CancelledError> for CatalogError {
    fn from(err: CancelledError) -> Self {
        Self::Cancelled {
            operation: err.operation,
            reason: err.reason,
        }
    }
}
