//! Offset pagination for search and list results.

use serde::{Deserialize, Serialize};

/// Page size used when the caller passes a limit of zero.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a single call may return.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Pagination configuration for a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of results to return. Zero selects the default.
    pub limit: u32,

    /// Number of matching records to skip.
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Creates pagination with the given limit and offset.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// First page with the given limit.
    pub fn first(limit: u32) -> Self {
        Self::new(limit, 0)
    }

    /// The page following this one.
    pub fn next(&self) -> Self {
        Self::new(self.limit, self.offset.saturating_add(self.limit))
    }

    /// Resolves the effective limit against a default and an upper bound.
    pub fn effective_limit(&self, default: u32, max: u32) -> u32 {
        match self.limit {
            0 => default.min(max),
            limit => limit.min(max),
        }
    }
}

/// One page of results plus the number of records matching the filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,

    /// Matching records before pagination.
    pub total: u64,
}

impl<T> Page<T> {
    /// Returns `true` if the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of records on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit() {
        assert_eq!(Pagination::new(0, 0).effective_limit(20, 1000), 20);
        assert_eq!(Pagination::new(5, 0).effective_limit(20, 1000), 5);
        assert_eq!(Pagination::new(5000, 0).effective_limit(20, 1000), 1000);
    }

    #[test]
    fn test_next_page() {
        let page = Pagination::first(10).next().next();
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
    }
}
