//! Pagination.

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::product::Product;

/// A validated page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Maximum records per page.
    pub limit: u32,
}

impl Page {
    /// Validate a page request against the configured maximum page size.
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Result<Self, CatalogError> {
        if page == 0 {
            return Err(CatalogError::validation("page", "must be at least 1"));
        }
        if limit == 0 || limit > max_limit {
            return Err(CatalogError::validation(
                "limit",
                format!("must be between 1 and {max_limit}"),
            ));
        }
        Ok(Self { page, limit })
    }

    /// Records to skip: `(page - 1) * limit`.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// One page of products ordered by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    /// Products in this page.
    pub products: Vec<Product>,
    /// Number of products in this page.
    pub count: usize,
}

impl From<Vec<Product>> for ProductPage {
    fn from(products: Vec<Product>) -> Self {
        Self {
            count: products.len(),
            products,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 10, 0)]
    #[test_case(2, 10, 10)]
    #[test_case(4, 10, 30)]
    #[test_case(3, 7, 14)]
    fn offset_is_page_minus_one_times_limit(page: u32, limit: u32, expected: u64) {
        assert_eq!(Page::new(page, limit, 100).unwrap().offset(), expected);
    }

    #[test_case(0, 10 ; "zero page")]
    #[test_case(1, 0 ; "zero limit")]
    #[test_case(1, 101 ; "limit above max")]
    fn invalid_pages_rejected(page: u32, limit: u32) {
        assert!(Page::new(page, limit, 100).is_err());
    }

    #[test]
    fn large_page_offset_does_not_overflow() {
        let page = Page::new(u32::MAX, 100, 100).unwrap();
        assert_eq!(page.offset(), (u64::from(u32::MAX) - 1) * 100);
    }
}
