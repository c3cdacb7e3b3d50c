// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Product Service - Rust Core Library
//!
//! Product catalog and inventory service: product CRUD, atomic stock
//! adjustments, and per-user purchase history over a pluggable store.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `catalog`: Product, stock adjustments, purchases, `ProductRepository` port
//!   - `shared`: Identifiers and the per-request context (deadline + cancellation)
//!
//! - **Application**: Orchestration
//!   - `services`: `ProductService` (validation, read retries, metrics)
//!   - `retry`: Exponential backoff policy for idempotent reads
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`: SQLite (`SQLx`) and embedded document store adapters
//!   - `http`: Axum REST API
//!   - `config`: Dependency injection container

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and retry policy.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// YAML configuration loading and validation.
pub mod config;

/// HTTP error mapping.
pub mod error;

/// Prometheus metrics.
pub mod observability;

/// Logging and OpenTelemetry setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::catalog::{
    AmountCheck, CatalogError, DeleteOutcome, NewProduct, Product, ProductPage,
    ProductRepository, ProductUpdate, PurchaseOrder, PurchaseRecord, PurchasedProduct,
    StockAdjustment, StockReason,
};
pub use domain::shared::{ProductId, PurchaseId, RequestContext, UserId};

// Application re-exports
pub use application::{ProductService, RetryPolicy};

// Infrastructure re-exports
pub use infrastructure::config::Container;
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::persistence::{DocumentProductRepository, SqlProductRepository};
