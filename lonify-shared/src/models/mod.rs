//! Database models and the loan application lifecycle.
//!
//! - `user`: accounts, roles, suspension
//! - `loan`: loan products authored by managers
//! - `application`: loan applications and their status state machine

pub mod application;
pub mod loan;
pub mod user;

use serde::Serialize;

/// Fixed page size used by every paginated listing
pub const PAGE_SIZE: i64 = 10;

/// One page of a listing, with the page count derived from the total
///
/// # Example
///
/// ```
/// use lonify_shared::models::Page;
///
/// let page = Page::new(vec!["a", "b"], 23, 1);
/// assert_eq!(page.total, 23);
/// assert_eq!(page.page_count, 3);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,

    /// Total number of matching records across all pages
    pub total: i64,

    /// 1-based page number this response covers
    pub page: i64,

    /// Total number of pages at [`PAGE_SIZE`] items per page
    pub page_count: i64,
}

impl<T> Page<T> {
    /// Builds a page, deriving `page_count` from the total count
    pub fn new(items: Vec<T>, total: i64, page: i64) -> Self {
        let page_count = (total + PAGE_SIZE - 1) / PAGE_SIZE;
        Self {
            items,
            total,
            page,
            page_count,
        }
    }
}

/// Converts a 1-based page number into a row offset
pub fn page_offset(page: i64) -> i64 {
    (page.max(1) - 1) * PAGE_SIZE
}
