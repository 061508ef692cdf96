//! Page request and page envelope for list queries.

use serde::{Deserialize, Serialize};

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Pagination request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, starting at 1
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl PageRequest {
    /// Page 0 is treated as page 1; a zero page size falls back to the default.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: if per_page == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                per_page
            },
        }
    }

    /// SQL OFFSET for this page
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// SQL LIMIT for this page
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of an identity-ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in the current page
    pub data: Vec<T>,
    /// Current page number
    pub current_page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of items across all pages
    pub total: u64,
    /// Last page number, never below 1
    pub last_page: u32,
}

impl<T> Page<T> {
    /// Create a new paginated response
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        let last_page = u32::try_from(total.div_ceil(u64::from(request.per_page)))
            .unwrap_or(u32::MAX)
            .max(1);

        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_page_request_default() {
        let request = PageRequest::default();
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, 10);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let request = PageRequest::new(0, 10);
        assert_eq!(request.page, 1);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        assert_eq!(PageRequest::new(3, 10).limit(), 10);
    }

    #[test]
    fn test_page_new() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));

        assert_eq!(page.data.len(), 3);
        assert_eq!(page.total, 25);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.last_page, 3);
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let page: Page<i32> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(page.last_page, 1);
        assert_eq!(page.current_page, 1);
    }

    proptest! {
        #[test]
        fn pages_tile_the_result_set(total in 0u64..500, per_page in 1u32..50) {
            let last = Page::<()>::new(vec![], total, PageRequest::new(1, per_page)).last_page;
            let covered: u64 = (1..=last)
                .map(|p| {
                    let request = PageRequest::new(p, per_page);
                    let start = u64::try_from(request.offset()).unwrap();
                    total.saturating_sub(start).min(u64::from(per_page))
                })
                .sum();
            prop_assert_eq!(covered, total);
        }
    }
}
