//! Page sizing and pagination metadata

use serde::Serialize;

use super::request::PageSize;

/// Configured page-size bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: i64,
    pub max_size: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 100,
        }
    }
}

impl PageLimits {
    /// Effective page size, `None` for the unpaginated `all` sentinel.
    ///
    /// Missing or invalid sizes use the default; large ones are clamped.
    pub fn resolve(&self, requested: Option<PageSize>) -> Option<i64> {
        match requested {
            Some(PageSize::All) => None,
            Some(PageSize::Count(n)) if n >= 1 => Some(n.min(self.max_size.max(1))),
            _ => Some(self.default_size.max(1)),
        }
    }
}

/// Pagination metadata over the filtered, unpaginated row set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

impl PageMeta {
    pub fn new(total: i64, current_page: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            total,
            current_page: current_page.max(1),
            per_page,
            last_page,
        }
    }

    /// One page holding every row
    pub fn unpaginated(total: i64) -> Self {
        Self {
            total,
            current_page: 1,
            per_page: total.max(1),
            last_page: 1,
        }
    }

    /// Row offset of the current page, saturating for absurd page numbers
    pub fn offset(&self) -> i64 {
        (self.current_page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_meta() {
        let meta = PageMeta::new(25, 2, 10);
        assert_eq!(
            meta,
            PageMeta {
                total: 25,
                current_page: 2,
                per_page: 10,
                last_page: 3
            }
        );
        assert_eq!(meta.offset(), 10);
        assert_eq!(PageMeta::new(0, 1, 10).last_page, 1);
        assert_eq!(PageMeta::new(20, 1, 10).last_page, 2);
    }

    #[test]
    fn test_offset_saturates_on_huge_pages() {
        let meta = PageMeta::new(3, i64::MAX, 10);
        assert_eq!(meta.current_page, i64::MAX);
        assert_eq!(meta.offset(), i64::MAX);
        assert_eq!(PageMeta::new(3, 1_000_000_000_000_000_000, 100).offset(), i64::MAX);
    }

    #[test]
    fn test_unpaginated_meta() {
        assert_eq!(PageMeta::unpaginated(7).per_page, 7);
        assert_eq!(PageMeta::unpaginated(7).last_page, 1);
        assert_eq!(PageMeta::unpaginated(0).per_page, 1);
    }

    #[test]
    fn test_resolve_limits() {
        let limits = PageLimits::default();
        assert_eq!(limits.resolve(None), Some(10));
        assert_eq!(limits.resolve(Some(PageSize::Count(0))), Some(10));
        assert_eq!(limits.resolve(Some(PageSize::Count(25))), Some(25));
        assert_eq!(limits.resolve(Some(PageSize::Count(1000))), Some(100));
        assert_eq!(limits.resolve(Some(PageSize::All)), None);
    }
}
