use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based pagination request. Out-of-range values are clamped rather than
/// rejected so list endpoints stay forgiving to sloppy clients.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Slices one page out of an already-ordered full result set.
    pub fn from_vec(all: Vec<T>, req: PageRequest) -> Self {
        let req = PageRequest::new(req.page, req.page_size);
        let total_count = all.len() as u64;
        let total_pages = total_count.div_ceil(req.page_size as u64) as u32;
        let start = ((req.page - 1) as usize).saturating_mul(req.page_size as usize);
        let items: Vec<T> = all
            .into_iter()
            .skip(start)
            .take(req.page_size as usize)
            .collect();
        Self {
            items,
            page: req.page,
            page_size: req.page_size,
            total_count,
            total_pages,
            has_next: req.page < total_pages,
            has_previous: req.page > 1 && total_count > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_with_remainder() {
        let page = Page::from_vec((0..25).collect::<Vec<_>>(), PageRequest::new(3, 10));
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn clamps_page_and_size() {
        let page = Page::from_vec(vec![1, 2, 3], PageRequest::new(0, 500));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_previous);
    }

    #[test]
    fn empty_set_has_zero_pages() {
        let page = Page::from_vec(Vec::<u8>::new(), PageRequest::default());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }
}
