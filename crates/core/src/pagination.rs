//! Page-number pagination shared by the record layer and list endpoints.

use serde::Serialize;

/// Page size used when the caller supplies none or a non-positive one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound on rows returned by a single page.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// A normalised page request. Construct through [`PageRequest::new`] so the
/// bounds always hold: `page >= 1` and `1 <= page_size <= MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Coerce raw caller input into a valid request.
    ///
    /// A page below 1 becomes 1, a page size below 1 becomes
    /// [`DEFAULT_PAGE_SIZE`] and one above [`MAX_PAGE_SIZE`] is capped.
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = page.max(1);
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE)
        };
        Self { page, page_size }
    }

    /// Same as [`PageRequest::new`] for optional query-string values.
    pub fn from_query(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self::new(page.unwrap_or(1), page_size.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn empty(request: PageRequest) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_passes_through() {
        let req = PageRequest::new(3, 25);
        assert_eq!(req, PageRequest { page: 3, page_size: 25 });
        assert_eq!(req.offset(), 50);
    }

    #[test]
    fn non_positive_page_becomes_first_page() {
        assert_eq!(PageRequest::new(0, 5).page, 1);
        assert_eq!(PageRequest::new(-7, 5).page, 1);
    }

    #[test]
    fn non_positive_page_size_uses_default() {
        let req = PageRequest::new(0, -5);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn page_size_is_capped() {
        assert_eq!(PageRequest::new(1, 5000).page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(1, MAX_PAGE_SIZE).page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn from_query_defaults_missing_values() {
        assert_eq!(
            PageRequest::from_query(None, None),
            PageRequest { page: 1, page_size: DEFAULT_PAGE_SIZE }
        );
    }

    #[test]
    fn huge_page_does_not_overflow_offset() {
        let req = PageRequest::new(i64::MAX, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), i64::MAX);
    }
}
