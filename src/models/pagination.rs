//! Pagination parameters and results

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
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

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        let per_page = self.per_page as i64;
        ((self.total + per_page - 1) / per_page) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// A page past the end; the first page is always in range, even when empty
    pub fn is_out_of_range(&self) -> bool {
        self.page > 1 && self.page > self.total_pages()
    }

    /// Navigation data for templates
    pub fn page_info(&self) -> PageInfo {
        let total_pages = self.total_pages().max(1);
        PageInfo {
            number: self.page,
            total_pages,
            has_next: self.has_next(),
            has_prev: self.has_prev(),
            next: self.page + 1,
            prev: self.page.saturating_sub(1).max(1),
        }
    }
}

/// Page navigation as rendered by the paginator include
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub number: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub next: u32,
    pub prev: u32,
}
