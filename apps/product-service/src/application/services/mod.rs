//! Application Services
//!
//! Application services coordinate domain logic and the repository port.

mod product_service;

pub use product_service::{DEFAULT_MAX_PAGE_SIZE, ProductService};
