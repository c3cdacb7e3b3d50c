//! Errors shared across bounded contexts.

use std::fmt;

/// Why a request stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller (or the server shutting down) cancelled the request.
    Cancelled,
    /// The request deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// A request was abandoned because its context was cancelled or expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledError {
    /// Operation that was interrupted.
    pub operation: String,
    /// Cancellation cause.
    pub reason: CancelReason,
}

impl CancelledError {
    /// Create a new cancellation error.
    #[must_use]
    pub fn new(operation: impl Into<String>, reason: CancelReason) -> Self {
        Self {
            operation: operation.into(),
            reason,
        }
    }
}

impl fmt::Display for CancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.reason)
    }
}

impl std::error::Error for CancelledError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_error_display() {
        let err = CancelledError::new("get_by_id", CancelReason::DeadlineExceeded);
        assert_eq!(err.to_string(), "get_by_id deadline exceeded");
    }
}
