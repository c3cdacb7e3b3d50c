//! Document-store product repository.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::store::{
    Collections, Document, DocumentStore, DocumentStoreError, Filter, FindOptions, ID_FIELD, Update,
};
use crate::domain::catalog::{
    AmountCheck, CatalogError, DeleteOutcome, NewProduct, Page, Product, ProductPage,
    ProductRepository, ProductUpdate, PurchaseOrder, PurchaseRecord, PurchasedProduct,
    StockAdjustment, purchase::sort_history,
};
use crate::domain::shared::{ProductId, PurchaseId, RequestContext, UserId};

const PRODUCTS: &str = "products";
const PURCHASES: &str = "purchases";

#[derive(Debug, Serialize, Deserialize)]
struct ProductDocument {
    #[serde(default)]
    id: i64,
    name: String,
    description: String,
    price: Decimal,
    amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductDocument> for Product {
    fn from(doc: ProductDocument) -> Self {
        Self {
            id: ProductId::new(doc.id),
            name: doc.name,
            description: doc.description,
            price: doc.price,
            amount: doc.amount,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PurchaseDocument {
    #[serde(default)]
    id: i64,
    user_id: String,
    product_id: i64,
    quantity: i64,
    purchased_at: DateTime<Utc>,
}

impl From<PurchaseDocument> for PurchaseRecord {
    fn from(doc: PurchaseDocument) -> Self {
        Self {
            id: PurchaseId::new(doc.id),
            user_id: UserId::new(doc.user_id),
            product_id: ProductId::new(doc.product_id),
            quantity: doc.quantity,
            purchased_at: doc.purchased_at,
        }
    }
}

impl From<DocumentStoreError> for CatalogError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::Closed | DocumentStoreError::Io { .. } => Self::Unavailable {
                message: err.to_string(),
            },
            DocumentStoreError::Serialization(_) => Self::storage("document", err.to_string()),
            DocumentStoreError::Increment { .. } => Self::write("document", err.to_string()),
        }
    }
}

/// `ProductRepository` backed by the embedded [`DocumentStore`].
///
/// Stock changes are guarded updates evaluated under the store's write
/// lock, so concurrent decrements never oversell.
#[derive(Debug)]
pub struct DocumentProductRepository {
    store: DocumentStore,
}

impl DocumentProductRepository {
    /// Wrap an existing store.
    #[must_use]
    pub const fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Repository over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(DocumentStore::in_memory())
    }

    /// Repository persisted to a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be loaded.
    pub fn open(snapshot_path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        Ok(Self::new(DocumentStore::open(snapshot_path)?))
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Document, CatalogError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(CatalogError::write(
            "encode",
            format!("expected a document, got {other}"),
        )),
        Err(e) => Err(CatalogError::write("encode", e.to_string())),
    }
}

fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, CatalogError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| CatalogError::storage("decode", e.to_string()))
}

fn decode_product(doc: Document) -> Result<Product, CatalogError> {
    decode::<ProductDocument>(doc).map(Product::from)
}

fn timestamp(at: DateTime<Utc>) -> Result<Value, CatalogError> {
    serde_json::to_value(at).map_err(|e| CatalogError::write("encode", e.to_string()))
}

fn find_product(data: &Collections, id: ProductId) -> Result<Option<Product>, CatalogError> {
    data.find_one(PRODUCTS, &Filter::id(id.value()))
        .map(decode_product)
        .transpose()
}

fn negated(field: &str, by: i64) -> Result<i64, CatalogError> {
    by.checked_neg()
        .ok_or_else(|| CatalogError::validation(field, "out of range"))
}

fn debit_guard(id: ProductId, by: i64) -> Filter {
    Filter::id(id.value()).and(Filter::gte("amount", by))
}

#[async_trait]
impl ProductRepository for DocumentProductRepository {
    async fn create(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, CatalogError> {
        ctx.run("create", async {
            let now = Utc::now();
            let doc = encode(&ProductDocument {
                id: 0,
                name: product.name,
                description: product.description,
                price: product.price,
                amount: product.amount,
                created_at: now,
                updated_at: now,
            })?;

            let id = self.store.insert_one(PRODUCTS, doc.clone())?;
            let mut stored = doc;
            stored.insert(ID_FIELD.to_string(), Value::from(id));
            let created = decode_product(stored)?;

            info!(product_id = %created.id, "Product created");
            Ok(created)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: ProductId) -> Result<Product, CatalogError> {
        ctx.run("get_by_id", async {
            let product = self.store.view(|data| find_product(data, id))??;
            debug!(product_id = %id, found = product.is_some(), "Product lookup");
            product.ok_or_else(|| CatalogError::product_not_found(id))
        })
        .await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        ctx.run("update", async {
            let patch = Update::new()
                .set("name", update.name)
                .set("description", update.description)
                .set("price", update.price.to_string())
                .set("amount", update.amount)
                .set("updated_at", timestamp(Utc::now())?);

            let doc = self
                .store
                .update_one(PRODUCTS, &Filter::id(id.value()), &patch)?
                .ok_or_else(|| CatalogError::product_not_found(id))?;

            info!(product_id = %id, "Product updated");
            decode_product(doc)
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: ProductId) -> Result<DeleteOutcome, CatalogError> {
        ctx.run("delete", async {
            let deleted = self.store.delete_one(PRODUCTS, &Filter::id(id.value()))?;
            if deleted == 0 {
                return Err(CatalogError::product_not_found(id));
            }
            info!(product_id = %id, "Product deleted");
            Ok(DeleteOutcome { success: true })
        })
        .await
    }

    async fn list(&self, ctx: &RequestContext, page: Page) -> Result<ProductPage, CatalogError> {
        ctx.run("list", async {
            let options = FindOptions::page(page.offset(), u64::from(page.limit));
            let docs = self.store.find(PRODUCTS, &Filter::All, &options)?;
            let products = docs
                .into_iter()
                .map(decode_product)
                .collect::<Result<Vec<_>, _>>()?;

            debug!(page = page.page, limit = page.limit, count = products.len(), "Products listed");
            Ok(ProductPage::from(products))
        })
        .await
    }

    async fn increase_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        ctx.run("increase_amount", async {
            let patch = Update::new()
                .inc("amount", by)
                .set("updated_at", timestamp(Utc::now())?);

            let doc = self
                .store
                .update_one(PRODUCTS, &Filter::id(id.value()), &patch)?
                .ok_or_else(|| CatalogError::product_not_found(id))?;
            let product = decode_product(doc)?;

            info!(product_id = %id, by, amount = product.amount, "Stock increased");
            Ok(StockAdjustment::applied(product))
        })
        .await
    }

    async fn decrease_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        ctx.run("decrease_amount", async {
            let patch = Update::new()
                .inc("amount", negated("amount_by", by)?)
                .set("updated_at", timestamp(Utc::now())?);

            let adjustment = self.store.transaction(|tx| {
                if let Some(doc) = tx.update_one(PRODUCTS, &debit_guard(id, by), &patch)? {
                    return decode_product(doc).map(StockAdjustment::applied);
                }
                find_product(tx, id)?
                    .map(StockAdjustment::refused)
                    .ok_or_else(|| CatalogError::product_not_found(id))
            })?;

            if adjustment.is_enough {
                info!(product_id = %id, by, amount = adjustment.product.amount, "Stock decreased");
            } else {
                warn!(
                    product_id = %id,
                    by,
                    amount = adjustment.product.amount,
                    reason = ?adjustment.reason,
                    "Stock decrease refused"
                );
            }
            Ok(adjustment)
        })
        .await
    }

    async fn check_amount(&self, ctx: &RequestContext, id: ProductId) -> Result<AmountCheck, CatalogError> {
        ctx.run("check_amount", async {
            self.store
                .view(|data| find_product(data, id))??
                .map(|p| AmountCheck::from(&p))
                .ok_or_else(|| CatalogError::product_not_found(id))
        })
        .await
    }

    async fn buy_product(
        &self,
        ctx: &RequestContext,
        order: PurchaseOrder,
    ) -> Result<Product, CatalogError> {
        ctx.run("buy_product", async {
            let now = Utc::now();
            let purchase = encode(&PurchaseDocument {
                id: 0,
                user_id: order.user_id.as_str().to_string(),
                product_id: order.product_id.value(),
                quantity: order.amount,
                purchased_at: now,
            })?;
            let product_id = order.product_id;

            let product = if order.debit_stock {
                let patch = Update::new()
                    .inc("amount", negated("amount", order.amount)?)
                    .set("updated_at", timestamp(now)?);

                self.store.transaction(|tx| {
                    let Some(doc) = tx.update_one(PRODUCTS, &debit_guard(product_id, order.amount), &patch)? else {
                        let current = find_product(tx, product_id)?
                            .ok_or_else(|| CatalogError::product_not_found(product_id))?;
                        return Err(CatalogError::InsufficientStock {
                            product_id,
                            requested: order.amount,
                            available: current.amount,
                        });
                    };
                    let product = decode_product(doc)?;
                    tx.insert_one(PURCHASES, purchase);
                    Ok(product)
                })?
            } else {
                self.store.insert_one(PURCHASES, purchase)?;
                self.store
                    .view(|data| find_product(data, product_id))??
                    .ok_or_else(|| CatalogError::product_not_found(product_id))?
            };

            info!(
                user_id = %order.user_id,
                product_id = %product_id,
                quantity = order.amount,
                debit_stock = order.debit_stock,
                "Purchase recorded"
            );
            Ok(product)
        })
        .await
    }

    async fn purchased_products_by_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Vec<PurchasedProduct>, CatalogError> {
        ctx.run("purchased_products_by_user", async {
            let mut history = self.store.view(|data| {
                data.find(PURCHASES, &Filter::eq("user_id", user_id.as_str()), &FindOptions::default())
                    .into_iter()
                    .map(|doc| {
                        let purchase = PurchaseRecord::from(decode::<PurchaseDocument>(doc)?);
                        let product = find_product(data, purchase.product_id)?;
                        Ok(PurchasedProduct::resolve(purchase, product))
                    })
                    .collect::<Result<Vec<_>, CatalogError>>()
            })??;
            sort_history(&mut history);

            debug!(user_id = %user_id, count = history.len(), "Purchase history loaded");
            Ok(history)
        })
        .await
    }

    async fn close(&self) -> Result<(), CatalogError> {
        self.store.close()?;
        info!("Document store repository closed");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "document"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::StockReason;
    use rust_decimal_macros::dec;

    fn lamp() -> NewProduct {
        NewProduct::new("Lamp", "desk lamp", dec!(19.99), 5)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();

        let created = repo.create(&ctx, lamp()).await.unwrap();
        assert_eq!(created.id, ProductId::new(1));
        assert_eq!(created.created_at, created.updated_at);

        let fetched = repo.get_by_id(&ctx, created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.price, dec!(19.99));
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();
        let created = repo.create(&ctx, lamp()).await.unwrap();

        let updated = repo
            .update(
                &ctx,
                created.id,
                ProductUpdate {
                    name: "Floor lamp".to_string(),
                    description: String::new(),
                    price: dec!(49.50),
                    amount: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Floor lamp");
        assert_eq!(updated.price, dec!(49.50));
        assert_eq!(updated.amount, 2);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn decrease_refuses_without_writing() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();
        let created = repo.create(&ctx, lamp()).await.unwrap();

        let refused = repo.decrease_amount(&ctx, created.id, 6).await.unwrap();
        assert!(!refused.is_enough);
        assert_eq!(refused.reason, StockReason::InsufficientStock);
        assert_eq!(refused.product.amount, 5);
        assert_eq!(refused.product.updated_at, created.updated_at);
    }

    #[tokio::test]
    async fn increase_overflow_is_write_error() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();
        let created = repo
            .create(&ctx, NewProduct::new("Bolt", "", dec!(0.10), i64::MAX))
            .await
            .unwrap();

        let err = repo.increase_amount(&ctx, created.id, 1).await.unwrap_err();
        assert!(matches!(err, CatalogError::Write { .. }));
        assert_eq!(repo.check_amount(&ctx, created.id).await.unwrap().amount, i64::MAX);
    }

    #[tokio::test]
    async fn cancelled_context_leaves_store_untouched() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();
        ctx.cancel();

        let err = repo.create(&ctx, lamp()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Cancelled { .. }));
        assert_eq!(repo.store().view(|d| d.count(PRODUCTS)).unwrap(), 0);
    }

    #[tokio::test]
    async fn closed_repository_reports_unavailable() {
        let repo = DocumentProductRepository::in_memory();
        repo.close().await.unwrap();

        let err = repo
            .get_by_id(&RequestContext::background(), ProductId::new(1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let ctx = RequestContext::background();

        let repo = DocumentProductRepository::open(&path).unwrap();
        let created = repo.create(&ctx, lamp()).await.unwrap();
        repo.buy_product(&ctx, PurchaseOrder::with_debit("u1", created.id, 2))
            .await
            .unwrap();
        repo.close().await.unwrap();

        let reopened = DocumentProductRepository::open(&path).unwrap();
        assert_eq!(reopened.check_amount(&ctx, created.id).await.unwrap().amount, 3);
        let history = reopened
            .purchased_products_by_user(&ctx, &UserId::new("u1"))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn min_amounts_are_rejected_without_writing() {
        let repo = DocumentProductRepository::in_memory();
        let ctx = RequestContext::background();
        let created = repo.create(&ctx, lamp()).await.unwrap();

        let err = repo
            .decrease_amount(&ctx, created.id, i64::MIN)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "amount_by"));

        let err = repo
            .buy_product(&ctx, PurchaseOrder::with_debit("u1", created.id, i64::MIN))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "amount"));

        assert_eq!(repo.check_amount(&ctx, created.id).await.unwrap().amount, 5);
        let history = repo
            .purchased_products_by_user(&ctx, &UserId::new("u1"))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn acknowledged_writes_survive_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let ctx = RequestContext::background();

        let repo = DocumentProductRepository::open(&path).unwrap();
        let created = repo.create(&ctx, lamp()).await.unwrap();
        repo.decrease_amount(&ctx, created.id, 2).await.unwrap();
        std::mem::forget(repo);

        let reopened = DocumentProductRepository::open(&path).unwrap();
        let product = reopened.get_by_id(&ctx, created.id).await.unwrap();
        assert_eq!(product.name, "Lamp");
        assert_eq!(product.amount, 3);
    }
}
