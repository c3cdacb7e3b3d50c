//! Product Service
//!
//! Validates input at the boundary, delegates to the repository, and
//! retries idempotent reads on transient store failures. Repository errors
//! pass through unchanged.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::retry::{Backoff, RetryPolicy};
use crate::domain::catalog::{
    AmountCheck, CatalogError, DeleteOutcome, NewProduct, Page, Product, ProductPage,
    ProductRepository, ProductUpdate, PurchaseOrder, PurchasedProduct, StockAdjustment,
};
use crate::domain::shared::{ProductId, RequestContext, UserId};
use crate::observability::{
    record_operation_latency, record_purchase, record_read_retry, record_stock_adjustment,
};

/// Default maximum page size for [`ProductService::list_products`].
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Application service for the product catalog.
pub struct ProductService<R>
where
    R: ProductRepository,
{
    repository: Arc<R>,
    retry: RetryPolicy,
    max_page_size: u32,
}

impl<R> ProductService<R>
where
    R: ProductRepository,
{
    /// Create a service with the default retry policy and page size.
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            retry: RetryPolicy::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Set the retry policy for reads.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the largest accepted page size.
    #[must_use]
    pub const fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// The underlying repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Largest accepted page size.
    pub const fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields, `Write` if the store rejects the insert.
    pub async fn create_product(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, CatalogError> {
        product.validate()?;
        timed("create_product", self.repository.create(ctx, product)).await
    }

    /// Fetch a product by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown.
    pub async fn get_product(
        &self,
        ctx: &RequestContext,
        id: ProductId,
    ) -> Result<Product, CatalogError> {
        debug!(product_id = %id, "Fetching product");
        timed(
            "get_product",
            self.read_with_retry(ctx, "get_product", || self.repository.get_by_id(ctx, id)),
        )
        .await
    }

    /// Replace a product's mutable fields.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound`, or `Write`.
    pub async fn update_product(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        update.validate()?;
        timed("update_product", self.repository.update(ctx, id, update)).await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing was deleted, `Write` on store failure.
    pub async fn delete_product(
        &self,
        ctx: &RequestContext,
        id: ProductId,
    ) -> Result<DeleteOutcome, CatalogError> {
        timed("delete_product", self.repository.delete(ctx, id)).await
    }

    /// One page of products in id order.
    ///
    /// # Errors
    ///
    /// `Validation` if `page` is zero or `limit` is outside `1..=max_page_size`.
    pub async fn list_products(
        &self,
        ctx: &RequestContext,
        page: u32,
        limit: u32,
    ) -> Result<ProductPage, CatalogError> {
        let page = Page::new(page, limit, self.max_page_size)?;
        debug!(page = page.page, limit = page.limit, "Listing products");
        timed(
            "list_products",
            self.read_with_retry(ctx, "list_products", || self.repository.list(ctx, page)),
        )
        .await
    }

    /// Add `by` units to a product's stock.
    ///
    /// # Errors
    ///
    /// `Validation` unless `by > 0`; `NotFound`; `Write` on overflow or store failure.
    pub async fn increase_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        validate_amount_by(by)?;
        let result = timed("increase_amount", self.repository.increase_amount(ctx, id, by)).await;
        let outcome = result
            .as_ref()
            .map_or("error", |adjustment| adjustment.reason.as_str());
        record_stock_adjustment("increase", outcome);
        result
    }

    /// Remove `by` units if enough are in stock.
    ///
    /// # Errors
    ///
    /// `Validation` unless `by > 0`; `NotFound`; `Write` on store failure.
    /// Insufficient stock is reported in the result, not as an error.
    pub async fn decrease_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        validate_amount_by(by)?;
        let result = timed("decrease_amount", self.repository.decrease_amount(ctx, id, by)).await;
        let outcome = result
            .as_ref()
            .map_or("error", |adjustment| adjustment.reason.as_str());
        record_stock_adjustment("decrease", outcome);
        result
    }

    /// Current stock of a product.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown.
    pub async fn check_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
    ) -> Result<AmountCheck, CatalogError> {
        timed(
            "check_amount",
            self.read_with_retry(ctx, "check_amount", || self.repository.check_amount(ctx, id)),
        )
        .await
    }

    /// Record a purchase, optionally debiting stock.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound`, `InsufficientStock` (debit only), or `Write`.
    pub async fn buy_product(
        &self,
        ctx: &RequestContext,
        order: PurchaseOrder,
    ) -> Result<Product, CatalogError> {
        order.validate()?;
        let debit_stock = order.debit_stock;

        let result = timed("buy_product", self.repository.buy_product(ctx, order)).await;
        let outcome = match &result {
            Ok(_) => "recorded",
            Err(CatalogError::InsufficientStock { .. }) => "insufficient_stock",
            Err(CatalogError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        record_purchase(debit_stock, outcome);
        result
    }

    /// A user's purchase history.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank user id; any store failure other than a
    /// missing product fails the whole call.
    pub async fn purchased_products(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Vec<PurchasedProduct>, CatalogError> {
        if user_id.is_blank() {
            return Err(CatalogError::validation("user_id", "must not be empty"));
        }
        debug!(user_id = %user_id, "Fetching purchase history");
        timed(
            "purchased_products",
            self.read_with_retry(ctx, "purchased_products", || {
                self.repository.purchased_products_by_user(ctx, user_id)
            }),
        )
        .await
    }

    /// Release the store.
    ///
    /// # Errors
    ///
    /// Propagates the repository's close error.
    pub async fn close(&self) -> Result<(), CatalogError> {
        info!(backend = self.repository.backend(), "Closing product store");
        self.repository.close().await
    }

    /// Run an idempotent read, retrying on `Unavailable` with backoff.
    ///
    /// Backoff sleeps honour the request context, so a deadline cuts the
    /// retry loop short with `Cancelled`.
    async fn read_with_retry<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, CatalogError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut backoff = Backoff::new(&self.retry);
        loop {
            match call().await {
                Err(err) if err.is_transient() => {
                    let Some(delay) = backoff.next_delay() else {
                        warn!(operation, retries = backoff.retries(), error = %err, "Read retries exhausted");
                        return Err(err);
                    };
                    warn!(
                        operation,
                        retry = backoff.retries(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient store failure, retrying read"
                    );
                    record_read_retry(operation);
                    ctx.sleep(operation, delay).await?;
                }
                result => return result,
            }
        }
    }
}

fn validate_amount_by(by: i64) -> Result<(), CatalogError> {
    if by <= 0 {
        return Err(CatalogError::validation("amount_by", "must be positive"));
    }
    Ok(())
}

async fn timed<T, Fut>(operation: &'static str, work: Fut) -> Result<T, CatalogError>
where
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let started = Instant::now();
    let result = work.await;
    record_operation_latency(operation, started.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::repository::MockProductRepository;
    use crate::domain::catalog::StockReason;
    use crate::domain::shared::CancelReason;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn product(id: i64, amount: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: "Lamp".to_string(),
            description: "Desk lamp".to_string(),
            price: dec!(19.99),
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    fn unavailable() -> CatalogError {
        CatalogError::Unavailable {
            message: "pool timed out".to_string(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(2),
            2.0,
            0.0,
        )
    }

    fn service(repo: MockProductRepository) -> ProductService<MockProductRepository> {
        ProductService::new(Arc::new(repo)).with_retry_policy(fast_retry(3))
    }

    #[tokio::test]
    async fn test_get_retries_transient_failures() {
        let mut repo = MockProductRepository::new();
        let mut calls = 0;
        repo.expect_get_by_id().times(3).returning(move |_, id| {
            calls += 1;
            if calls < 3 {
                Err(unavailable())
            } else {
                Ok(product(id.value(), 5))
            }
        });

        let found = service(repo)
            .get_product(&RequestContext::background(), ProductId::new(7))
            .await
            .unwrap();
        assert_eq!(found.id, ProductId::new(7));
    }

    #[tokio::test]
    async fn test_get_gives_up_after_max_attempts() {
        let mut repo = MockProductRepository::new();
        // one initial call plus three retries
        repo.expect_get_by_id()
            .times(4)
            .returning(|_, _| Err(unavailable()));

        let err = service(repo)
            .get_product(&RequestContext::background(), ProductId::new(1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut repo = MockProductRepository::new();
        repo.expect_check_amount()
            .times(1)
            .returning(|_, id| Err(CatalogError::product_not_found(id)));

        let err = service(repo)
            .check_amount(&RequestContext::background(), ProductId::new(3))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_writes_are_never_retried() {
        let mut repo = MockProductRepository::new();
        repo.expect_decrease_amount()
            .times(1)
            .returning(|_, _, _| Err(unavailable()));

        let err = service(repo)
            .decrease_amount(&RequestContext::background(), ProductId::new(3), 1)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_retry_stops_when_context_is_cancelled() {
        let mut repo = MockProductRepository::new();
        repo.expect_list().returning(|ctx, _| {
            ctx.cancel();
            Err(unavailable())
        });

        let err = service(repo)
            .list_products(&RequestContext::background(), 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Cancelled {
                reason: CancelReason::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_rejects_oversized_page_without_store_call() {
        let repo = MockProductRepository::new();
        let svc = ProductService::new(Arc::new(repo)).with_max_page_size(50);

        let err = svc
            .list_products(&RequestContext::background(), 1, 51)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "limit"));
    }

    #[tokio::test]
    async fn test_create_validates_before_store() {
        let repo = MockProductRepository::new();
        let err = service(repo)
            .create_product(
                &RequestContext::background(),
                NewProduct::new("  ", "", dec!(1), 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_adjustment_rejects_non_positive_amount() {
        let repo = MockProductRepository::new();
        let svc = service(repo);
        let ctx = RequestContext::background();

        for by in [0, -4] {
            let err = svc
                .increase_amount(&ctx, ProductId::new(1), by)
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "amount_by"));
        }
    }

    #[tokio::test]
    async fn test_soft_insufficiency_passes_through() {
        let mut repo = MockProductRepository::new();
        repo.expect_decrease_amount()
            .returning(|_, id, _| Ok(StockAdjustment::refused(product(id.value(), 0))));

        let adjustment = service(repo)
            .decrease_amount(&RequestContext::background(), ProductId::new(2), 3)
            .await
            .unwrap();
        assert!(!adjustment.is_enough);
        assert_eq!(adjustment.reason, StockReason::OutOfStock);
    }

    #[tokio::test]
    async fn test_buy_rejects_blank_user() {
        let repo = MockProductRepository::new();
        let err = service(repo)
            .buy_product(
                &RequestContext::background(),
                PurchaseOrder::record_only("", ProductId::new(1), 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "user_id"));
    }

    #[tokio::test]
    async fn test_history_rejects_blank_user() {
        let repo = MockProductRepository::new();
        let err = service(repo)
            .purchased_products(&RequestContext::background(), &UserId::new(" "))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }
}
