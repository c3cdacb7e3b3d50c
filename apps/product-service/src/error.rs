//! HTTP error mapping for the product service.
//!
//! Catalog errors reach the edge unchanged and are rendered here as a
//! `{ code, message, details }` JSON body with a matching status.
//!
//! # Status Codes
//!
//! | Code | Status | Usage |
//! |------|--------|-------|
//! | `PRODUCT_NOT_FOUND` | 404 | No product with the given id |
//! | `VALIDATION_FAILED` | 400 | Malformed body or field out of range |
//! | `INSUFFICIENT_STOCK` | 409 | Debit purchase against too little stock |
//! | `CANCELLED` | 504 / 408 | Deadline exceeded / caller cancelled |
//! | `STORE_UNAVAILABLE` | 503 | Transient store failure |
//! | `WRITE_FAILED` | 500 | Store rejected a write |
//! | `STORAGE_ERROR` | 500 | Store returned an unreadable record |

use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::catalog::CatalogError;
use crate::domain::shared::CancelReason;
use crate::observability::record_api_error;

/// Error codes returned to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No matching product.
    ProductNotFound,
    /// The store rejected a write.
    WriteFailed,
    /// Debit purchase could not be satisfied.
    InsufficientStock,
    /// Deadline exceeded or request cancelled.
    Cancelled,
    /// Request body or parameter rejected.
    ValidationFailed,
    /// Transient store failure.
    StoreUnavailable,
    /// Unreadable record in the store.
    StorageError,
}

impl ErrorCode {
    /// Default HTTP status for this code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound => StatusCode::NOT_FOUND,
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::InsufficientStock => StatusCode::CONFLICT,
            Self::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::WriteFailed | Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire name of the code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::WriteFailed => "WRITE_FAILED",
            Self::InsufficientStock => "INSUFFICIENT_STOCK",
            Self::Cancelled => "CANCELLED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::StorageError => "STORAGE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug, Error)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    context: Vec<(String, String)>,
}

impl ApiError {
    /// Create an error with the code's default status.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.status_code(),
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Override the status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Malformed request body, path, or query.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the response body.
    #[must_use]
    pub fn to_http_response(&self) -> HttpErrorResponse {
        HttpErrorResponse {
            code: self.code.reason().to_string(),
            message: self.message.clone(),
            details: self.context.iter().cloned().collect(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::NotFound { entity, id } => Self::new(ErrorCode::ProductNotFound, message)
                .with_context("entity", entity)
                .with_context("id", id),
            CatalogError::Write { operation, .. } => {
                Self::new(ErrorCode::WriteFailed, message).with_context("operation", operation)
            }
            CatalogError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::new(ErrorCode::InsufficientStock, message)
                .with_context("product_id", product_id.to_string())
                .with_context("requested", requested.to_string())
                .with_context("available", available.to_string()),
            CatalogError::Cancelled { operation, reason } => {
                let status = match reason {
                    CancelReason::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                    CancelReason::Cancelled => StatusCode::REQUEST_TIMEOUT,
                };
                Self::new(ErrorCode::Cancelled, message)
                    .with_status(status)
                    .with_context("operation", operation)
            }
            CatalogError::Validation { field, .. } => {
                Self::new(ErrorCode::ValidationFailed, message).with_context("field", field)
            }
            CatalogError::Unavailable { .. } => Self::new(ErrorCode::StoreUnavailable, message),
            CatalogError::Storage { operation, .. } => {
                Self::new(ErrorCode::StorageError, message).with_context("operation", operation)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        record_api_error(self.code.reason(), self.status.as_u16());
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, status = self.status.as_u16(), error = %self.message, "Request failed");
        } else {
            tracing::debug!(code = %self.code, status = self.status.as_u16(), error = %self.message, "Request rejected");
        }
        (self.status, Json(self.to_http_response())).into_response()
    }
}

/// HTTP error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::ProductId;
    use test_case::test_case;

    #[test_case(CatalogError::product_not_found(ProductId::new(1)), StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND")]
    #[test_case(CatalogError::write("create", "constraint"), StatusCode::INTERNAL_SERVER_ERROR, "WRITE_FAILED")]
    #[test_case(CatalogError::validation("price", "negative"), StatusCode::BAD_REQUEST, "VALIDATION_FAILED")]
    #[test_case(CatalogError::Unavailable { message: "io".into() }, StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")]
    #[test_case(CatalogError::storage("list", "bad price"), StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")]
    #[test_case(
        CatalogError::InsufficientStock { product_id: ProductId::new(2), requested: 3, available: 1 },
        StatusCode::CONFLICT,
        "INSUFFICIENT_STOCK"
    )]
    fn test_catalog_error_mapping(err: CatalogError, status: StatusCode, code: &str) {
        let api = ApiError::from(err);
        assert_eq!(api.status(), status);
        assert_eq!(api.code().reason(), code);
    }

    #[test_case(CancelReason::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT)]
    #[test_case(CancelReason::Cancelled, StatusCode::REQUEST_TIMEOUT)]
    fn test_cancel_status_depends_on_reason(reason: CancelReason, status: StatusCode) {
        let api = ApiError::from(CatalogError::Cancelled {
            operation: "list".to_string(),
            reason,
        });
        assert_eq!(api.code(), ErrorCode::Cancelled);
        assert_eq!(api.status(), status);
    }

    #[test]
    fn test_insufficient_stock_details() {
        let api = ApiError::from(CatalogError::InsufficientStock {
            product_id: ProductId::new(4),
            requested: 5,
            available: 2,
        });
        let body = api.to_http_response();
        assert_eq!(body.code, "INSUFFICIENT_STOCK");
        assert_eq!(body.details.get("available").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_error_display() {
        let error = ApiError::invalid_request("Missing field");
        assert_eq!(error.to_string(), "[VALIDATION_FAILED] Missing field");
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::StoreUnavailable).unwrap();
        assert_eq!(json, "\"STORE_UNAVAILABLE\"");
    }
}
