//! HTTP request DTOs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{NewProduct, ProductUpdate, PurchaseOrder};
use crate::domain::shared::{ProductId, UserId};

/// Body for creating or replacing a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRequest {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Units in stock.
    pub amount: i64,
}

impl From<ProductRequest> for NewProduct {
    fn from(request: ProductRequest) -> Self {
        Self::new(request.name, request.description, request.price, request.amount)
    }
}

impl From<ProductRequest> for ProductUpdate {
    fn from(request: ProductRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            price: request.price,
            amount: request.amount,
        }
    }
}

/// Body for increase/decrease endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountByRequest {
    /// Units to add or remove.
    pub amount_by: i64,
}

/// Query string for listing products.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListProductsQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Records per page.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    10
}

/// Body for recording a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Purchasing user.
    pub user_id: String,
    /// Product to buy.
    pub product_id: i64,
    /// Units to buy.
    pub amount: i64,
    /// Debit stock atomically with the purchase.
    #[serde(default)]
    pub debit_stock: bool,
}

impl From<PurchaseRequest> for PurchaseOrder {
    fn from(request: PurchaseRequest) -> Self {
        Self {
            user_id: UserId::new(request.user_id),
            product_id: ProductId::new(request.product_id),
            amount: request.amount,
            debit_stock: request.debit_stock,
        }
    }
}
