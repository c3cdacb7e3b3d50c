//! Purchase records and purchase history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::product::Product;
use crate::domain::shared::{ProductId, PurchaseId, UserId};

/// A single purchase event. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Store-assigned identifier.
    pub id: PurchaseId,
    /// Purchasing user.
    pub user_id: UserId,
    /// Purchased product.
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: i64,
    /// Store timestamp of the purchase.
    pub purchased_at: DateTime<Utc>,
}

/// Request to record a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Purchasing user.
    pub user_id: UserId,
    /// Product to buy.
    pub product_id: ProductId,
    /// Units to buy.
    pub amount: i64,
    /// Debit stock atomically with recording the purchase.
    ///
    /// When false the purchase is recorded without touching stock.
    #[serde(default)]
    pub debit_stock: bool,
}

impl PurchaseOrder {
    /// Purchase that only records the event.
    #[must_use]
    pub fn record_only(user_id: impl Into<UserId>, product_id: ProductId, amount: i64) -> Self {
        Self {
            user_id: user_id.into(),
            product_id,
            amount,
            debit_stock: false,
        }
    }

    /// Purchase that also debits stock.
    #[must_use]
    pub fn with_debit(user_id: impl Into<UserId>, product_id: ProductId, amount: i64) -> Self {
        Self {
            debit_stock: true,
            ..Self::record_only(user_id, product_id, amount)
        }
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.user_id.is_blank() {
            return Err(CatalogError::validation("user_id", "must not be empty"));
        }
        if self.amount <= 0 {
            return Err(CatalogError::validation("amount", "must be positive"));
        }
        Ok(())
    }
}

/// A purchase history entry, resolved against the current product state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchasedProduct {
    /// The product still exists.
    Resolved {
        /// The purchase event.
        purchase: PurchaseRecord,
        /// Current product state.
        product: Product,
    },
    /// The product no longer exists.
    Unavailable {
        /// The purchase event.
        purchase: PurchaseRecord,
    },
}

impl PurchasedProduct {
    /// Pair a purchase with its product lookup result.
    #[must_use]
    pub fn resolve(purchase: PurchaseRecord, product: Option<Product>) -> Self {
        match product {
            Some(product) => Self::Resolved { purchase, product },
            None => Self::Unavailable { purchase },
        }
    }

    /// The underlying purchase event.
    #[must_use]
    pub const fn purchase(&self) -> &PurchaseRecord {
        match self {
            Self::Resolved { purchase, .. } | Self::Unavailable { purchase } => purchase,
        }
    }

    /// The resolved product, if it still exists.
    #[must_use]
    pub const fn product(&self) -> Option<&Product> {
        match self {
            Self::Resolved { product, .. } => Some(product),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Order purchase history by purchase time, then by record id.
pub fn sort_history(entries: &mut [PurchasedProduct]) {
    entries.sort_by(|a, b| {
        let (a, b) = (a.purchase(), b.purchase());
        a.purchased_at.cmp(&b.purchased_at).then(a.id.cmp(&b.id))
    });
}
