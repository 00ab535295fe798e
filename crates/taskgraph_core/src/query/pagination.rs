//! Page slicing and compressed page-number bars.

use serde::Serialize;

/// One page of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed, clamped into `1..=total_pages` (1 when empty).
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Page-bar shape. Defaults: one edge page each side, two around current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub left_edge: usize,
    pub right_edge: usize,
    pub left_current: usize,
    pub right_current: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            left_edge: 1,
            right_edge: 1,
            left_current: 2,
            right_current: 2,
        }
    }
}

/// Slices `items` into the requested page.
///
/// `per_page == 0` is treated as 1.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));
    let start = (page - 1) * per_page;
    let items = items.into_iter().skip(start).take(per_page).collect();
    Page {
        items,
        page,
        per_page,
        total_pages,
        total_items,
    }
}

/// Builds a compressed page bar; `None` marks a gap.
///
/// A page is shown when it is within the left edge, the right edge, or
/// the window around `current`. Gaps never produce two `None` in a row.
pub fn generate_page_numbers(current: usize, total: usize, window: PageWindow) -> Vec<Option<usize>> {
    let mut pages = Vec::new();
    let mut last_page = 0;
    for page in 1..=total {
        let in_left_edge = page <= window.left_edge;
        let in_right_edge = page + window.right_edge > total;
        let in_window = page + window.left_current >= current
            && page <= current.saturating_add(window.right_current);
        if !(in_left_edge || in_right_edge || in_window) {
            continue;
        }
        if last_page + 1 != page {
            pages.push(None);
        }
        pages.push(Some(page));
        last_page = page;
    }
    pages
}
