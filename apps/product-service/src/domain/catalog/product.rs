//! Product Aggregate
//!
//! A catalog entry with its current stock amount. The store assigns the id
//! and both timestamps; `amount` is never persisted below zero.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use crate::domain::shared::ProductId;

/// Maximum product name length in characters.
pub const MAX_NAME_LENGTH: usize = 255;

/// A stored product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Units in stock.
    pub amount: i64,
    /// Creation time, set once.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when no units are left.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        self.amount == 0
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Initial stock.
    pub amount: i64,
}

impl NewProduct {
    /// Create a new product input.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        amount: i64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            amount,
        }
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_fields(&self.name, self.price, self.amount)
    }
}

/// Full-field replacement of a product's mutable fields.
///
/// `amount` overwrites stock directly; stock adjustments should go through
/// the increase/decrease operations instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Stock amount.
    pub amount: i64,
}

impl ProductUpdate {
    /// Check field constraints.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_fields(&self.name, self.price, self.amount)
    }
}

impl From<NewProduct> for ProductUpdate {
    fn from(value: NewProduct) -> Self {
        Self {
            name: value.name,
            description: value.description,
            price: value.price,
            amount: value.amount,
        }
    }
}

fn validate_fields(name: &str, price: Decimal, amount: i64) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::validation("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CatalogError::validation(
            "name",
            format!("must be at most {MAX_NAME_LENGTH} characters"),
        ));
    }
    if price < Decimal::ZERO {
        return Err(CatalogError::validation("price", "must not be negative"));
    }
    if amount < 0 {
        return Err(CatalogError::validation("amount", "must not be negative"));
    }
    Ok(())
}
