//! Catalog Bounded Context
//!
//! Products, stock adjustments, and purchase records.

pub mod errors;
pub mod page;
pub mod product;
pub mod purchase;
pub mod repository;
pub mod stock;

pub use errors::CatalogError;
pub use page::{Page, ProductPage};
pub use product::{NewProduct, Product, ProductUpdate};
pub use purchase::{PurchaseOrder, PurchaseRecord, PurchasedProduct};
pub use repository::{DeleteOutcome, ProductRepository};
pub use stock::{AmountCheck, StockAdjustment, StockReason};
