//! HTTP response DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{
    AmountCheck, DeleteOutcome, Product, ProductPage, PurchaseRecord, PurchasedProduct,
    StockAdjustment, StockReason,
};

/// A product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    /// Product ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Units in stock.
    pub amount: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.value(),
            name: product.name,
            description: product.description,
            price: product.price,
            amount: product.amount,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Response from delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Whether a product was removed.
    pub success: bool,
}

impl From<DeleteOutcome> for DeleteResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        Self {
            success: outcome.success,
        }
    }
}

/// One page of products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListResponse {
    /// Products in this page.
    pub products: Vec<ProductResponse>,
    /// Number of products in this page.
    pub count: usize,
}

impl From<ProductPage> for ProductListResponse {
    fn from(page: ProductPage) -> Self {
        Self {
            count: page.count,
            products: page.products.into_iter().map(ProductResponse::from).collect(),
        }
    }
}

/// Response from increase/decrease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentResponse {
    /// Whether the adjustment was applied.
    pub is_enough: bool,
    /// Outcome detail.
    pub reason: StockReason,
    /// Product after the call.
    pub product: ProductResponse,
}

impl From<StockAdjustment> for StockAdjustmentResponse {
    fn from(adjustment: StockAdjustment) -> Self {
        Self {
            is_enough: adjustment.is_enough,
            reason: adjustment.reason,
            product: adjustment.product.into(),
        }
    }
}

/// Current stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountResponse {
    /// Product ID.
    pub product_id: i64,
    /// Units in stock.
    pub amount: i64,
}

impl From<AmountCheck> for AmountResponse {
    fn from(check: AmountCheck) -> Self {
        Self {
            product_id: check.product_id.value(),
            amount: check.amount,
        }
    }
}

/// A stored purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    /// Purchase ID.
    pub id: i64,
    /// Purchasing user.
    pub user_id: String,
    /// Purchased product.
    pub product_id: i64,
    /// Units purchased.
    pub quantity: i64,
    /// Purchase time.
    pub purchased_at: DateTime<Utc>,
}

impl From<PurchaseRecord> for PurchaseResponse {
    fn from(record: PurchaseRecord) -> Self {
        Self {
            id: record.id.value(),
            user_id: record.user_id.to_string(),
            product_id: record.product_id.value(),
            quantity: record.quantity,
            purchased_at: record.purchased_at,
        }
    }
}

/// Resolution status of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseEntryStatus {
    /// Product still exists.
    Resolved,
    /// Product has been deleted.
    Unavailable,
}

/// A purchase history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEntryResponse {
    /// Resolution status.
    pub status: PurchaseEntryStatus,
    /// The purchase.
    pub purchase: PurchaseResponse,
    /// Current product, absent when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductResponse>,
}

impl From<PurchasedProduct> for PurchaseEntryResponse {
    fn from(entry: PurchasedProduct) -> Self {
        match entry {
            PurchasedProduct::Resolved { purchase, product } => Self {
                status: PurchaseEntryStatus::Resolved,
                purchase: purchase.into(),
                product: Some(product.into()),
            },
            PurchasedProduct::Unavailable { purchase } => Self {
                status: PurchaseEntryStatus::Unavailable,
                purchase: purchase.into(),
                product: None,
            },
        }
    }
}

/// A user's purchase history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseHistoryResponse {
    /// Entries ordered by purchase time.
    pub products: Vec<PurchaseEntryResponse>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Store backend in use.
    pub backend: String,
}
