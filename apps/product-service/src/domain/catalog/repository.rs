//! Product Repository Trait
//!
//! Defines the persistence abstraction for the catalog.
//! Implemented by adapters in the infrastructure layer.
//!
//! Stock arithmetic is the adapter's responsibility and must be a single
//! atomic conditional update in the store, so the guarantees hold across
//! several service instances sharing one store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::page::{Page, ProductPage};
use super::product::{NewProduct, Product, ProductUpdate};
use super::purchase::{PurchaseOrder, PurchasedProduct};
use super::stock::{AmountCheck, StockAdjustment};
use crate::domain::shared::{ProductId, RequestContext, UserId};

/// Result of deleting a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// True when a record was removed.
    pub success: bool,
}

/// Repository trait for product and purchase persistence.
///
/// Inputs are assumed to be validated by the caller. Every method checks
/// `ctx` before touching the store and returns [`CatalogError::Cancelled`]
/// if it is done.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert a product; the store assigns id and timestamps.
    ///
    /// # Errors
    ///
    /// `Write` if the store rejects the insert.
    async fn create(&self, ctx: &RequestContext, product: NewProduct)
    -> Result<Product, CatalogError>;

    /// Fetch a product.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record has this id.
    async fn get_by_id(&self, ctx: &RequestContext, id: ProductId)
    -> Result<Product, CatalogError>;

    /// Replace every mutable field and refresh `updated_at`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `Write` on store failure.
    async fn update(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError>;

    /// Hard-delete a product.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing was deleted, `Write` on store failure.
    async fn delete(&self, ctx: &RequestContext, id: ProductId)
    -> Result<DeleteOutcome, CatalogError>;

    /// One page of products in ascending id order.
    async fn list(&self, ctx: &RequestContext, page: Page) -> Result<ProductPage, CatalogError>;

    /// Atomically add `by` units.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `Write` on store failure or overflow.
    async fn increase_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError>;

    /// Atomically remove `by` units if at least `by` are in stock.
    ///
    /// Insufficient stock is not an error: the result carries
    /// `is_enough = false` and the unchanged product.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown, `Write` on store failure.
    async fn decrease_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError>;

    /// Current stock of a product.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown.
    async fn check_amount(&self, ctx: &RequestContext, id: ProductId)
    -> Result<AmountCheck, CatalogError>;

    /// Record a purchase and return the current product.
    ///
    /// Without `debit_stock` the record is inserted first and stock is left
    /// alone, so an unknown product still leaves a record behind. With
    /// `debit_stock` the decrement and the insert happen atomically or not
    /// at all.
    ///
    /// # Errors
    ///
    /// `NotFound` if the product does not exist, `InsufficientStock` when a
    /// debit cannot be satisfied, `Write` on store failure.
    async fn buy_product(
        &self,
        ctx: &RequestContext,
        order: PurchaseOrder,
    ) -> Result<Product, CatalogError>;

    /// A user's purchases, each resolved against the current product.
    ///
    /// Deleted products appear as [`PurchasedProduct::Unavailable`]; any
    /// other store failure fails the whole call.
    async fn purchased_products_by_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Vec<PurchasedProduct>, CatalogError>;

    /// Release the store handle.
    async fn close(&self) -> Result<(), CatalogError>;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
