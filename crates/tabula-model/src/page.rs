//! Pagination arithmetic and page payloads.

use serde::Serialize;
use tabula_types::{Record, DEFAULT_PAGE_SIZES};

/// Which page to load and how large pages are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// One-based page number; out-of-range values are clamped.
    pub page: u64,
    pub size: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, size: 25 }
    }
}

/// Ordering of a paged listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub reverse: bool,
    /// Sort column; the primary key when unset.
    pub order_key: Option<String>,
    /// Skip adapters and keep hidden columns.
    pub raw: bool,
}

/// One page of rows plus what a pager needs to render itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageData {
    pub data: Vec<Record>,
    /// The page actually loaded, after clamping.
    pub page: u64,
    pub size: u64,
    pub page_count: u64,
    pub total: u64,
    /// Page sizes to offer, ascending, including `size`.
    pub sizes: Vec<u64>,
}

/// Number of pages needed for `total` rows; at least one.
pub fn page_count(total: u64, size: u64) -> u64 {
    total.div_ceil(size.max(1)).max(1)
}

/// Clamps a one-based page number into `[1, page_count]`.
pub fn clamp_page(page: u64, page_count: u64) -> u64 {
    page.clamp(1, page_count.max(1))
}

/// The default page sizes merged with `size`, ascending and deduplicated.
pub fn size_options(size: u64) -> Vec<u64> {
    let mut sizes: Vec<u64> = DEFAULT_PAGE_SIZES.iter().map(|&s| s as u64).collect();
    sizes.push(size);
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Row offset of the first row on `page`.
pub(crate) fn offset(page: u64, size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up_and_never_hits_zero() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(101, 25), 5);
    }

    #[test]
    fn pages_are_clamped() {
        assert_eq!(clamp_page(0, 4), 1);
        assert_eq!(clamp_page(3, 4), 3);
        assert_eq!(clamp_page(9, 4), 4);
        assert_eq!(clamp_page(2, 0), 1);
    }

    #[test]
    fn requested_size_joins_the_defaults() {
        assert_eq!(size_options(25), vec![5, 10, 25, 50, 100]);
        assert_eq!(size_options(7), vec![5, 7, 10, 25, 50, 100]);
        assert_eq!(size_options(500), vec![5, 10, 25, 50, 100, 500]);
    }

    #[test]
    fn offsets_start_at_zero() {
        assert_eq!(offset(1, 25), 0);
        assert_eq!(offset(3, 10), 20);
        assert_eq!(offset(0, 10), 0);
    }
}
