//! Pagination types
//!
//! Page numbers are forgiving. A missing or garbled number means page 1
//! and a number out of range means the last page. An empty result still
//! has one (empty) page.

use serde::Serialize;

/// Resolved pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed, always valid for the total it was resolved against)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl ListParams {
    /// Resolve a raw `page` query value against the total item count.
    pub fn resolve(raw_page: Option<&str>, total: i64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let last = num_pages(total, per_page);
        let page = match raw_page.map(str::trim).and_then(|p| p.parse::<i64>().ok()) {
            None => 1,
            Some(n) if n < 1 || n > last as i64 => last,
            Some(n) => n as u32,
        };
        Self { page, per_page }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

fn num_pages(total: i64, per_page: u32) -> u32 {
    let total = total.max(0) as u64;
    let per_page = per_page.max(1) as u64;
    (total.div_ceil(per_page)).max(1) as u32
}

/// One page of results plus the metadata templates need
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub number: u32,
    pub per_page: u32,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let num_pages = num_pages(total, params.per_page);
        let number = params.page.min(num_pages);
        Self {
            items,
            total,
            number,
            per_page: params.per_page,
            num_pages,
            has_next: number < num_pages,
            has_previous: number > 1,
            next_page_number: (number < num_pages).then_some(number + 1),
            previous_page_number: (number > 1).then(|| number - 1),
        }
    }

    /// Check if the page holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
