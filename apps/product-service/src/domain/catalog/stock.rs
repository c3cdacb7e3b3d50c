//! Stock adjustment results.

use serde::{Deserialize, Serialize};

use super::product::Product;
use crate::domain::shared::ProductId;

/// Outcome of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    /// The adjustment was persisted.
    Applied,
    /// Nothing left to take.
    OutOfStock,
    /// Some stock left, but less than requested.
    InsufficientStock,
}

impl StockReason {
    /// Wire name, as serialized.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::OutOfStock => "out_of_stock",
            Self::InsufficientStock => "insufficient_stock",
        }
    }
}

/// Result of increasing or decreasing a product's amount.
///
/// Insufficient stock is reported here with `is_enough = false` rather
/// than as an error; in that case nothing was persisted and `product`
/// holds the unchanged record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    /// Whether the adjustment was applied.
    pub is_enough: bool,
    /// Outcome detail.
    pub reason: StockReason,
    /// Product state after the call.
    pub product: Product,
}

impl StockAdjustment {
    /// Adjustment that was persisted.
    #[must_use]
    pub const fn applied(product: Product) -> Self {
        Self {
            is_enough: true,
            reason: StockReason::Applied,
            product,
        }
    }

    /// Adjustment refused because `product` could not supply the requested units.
    #[must_use]
    pub const fn refused(product: Product) -> Self {
        let reason = if product.is_out_of_stock() {
            StockReason::OutOfStock
        } else {
            StockReason::InsufficientStock
        };
        Self {
            is_enough: false,
            reason,
            product,
        }
    }
}

/// Current stock of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountCheck {
    /// Product identifier.
    pub product_id: ProductId,
    /// Units in stock.
    pub amount: i64,
}

impl From<&Product> for AmountCheck {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            amount: product.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn product(amount: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(9),
            name: "Mug".to_string(),
            description: String::new(),
            price: Decimal::ONE,
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn refused_empty_product_is_out_of_stock() {
        let adj = StockAdjustment::refused(product(0));
        assert!(!adj.is_enough);
        assert_eq!(adj.reason, StockReason::OutOfStock);
    }

    #[test]
    fn refused_partial_stock_is_insufficient() {
        let adj = StockAdjustment::refused(product(2));
        assert!(!adj.is_enough);
        assert_eq!(adj.reason, StockReason::InsufficientStock);
        assert_eq!(adj.product.amount, 2);
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&StockReason::OutOfStock).unwrap();
        assert_eq!(json, "\"out_of_stock\"");
    }

    #[test]
    fn reason_label_matches_wire_name() {
        for reason in [
            StockReason::Applied,
            StockReason::OutOfStock,
            StockReason::InsufficientStock,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json.trim_matches('"'), reason.as_str());
        }
    }

    #[test]
    fn amount_check_from_product() {
        let check = AmountCheck::from(&product(4));
        assert_eq!(check.product_id, ProductId::new(9));
        assert_eq!(check.amount, 4);
    }
}
