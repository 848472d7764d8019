//! Compact page lists for table pagers
//!
//! Small pagers (seven pages or fewer) are shown in full. Larger ones keep
//! both ends and a neighbourhood around the active page, with a gap marker
//! wherever numbers were skipped:
//!
//! ```text
//! compact(10, 20) => 1 2 … 9 10 11 … 19 20
//! ```

use std::fmt;

use serde::Serialize;

/// Pagers with at most this many pages are never compacted
pub const FULL_PAGER_LIMIT: usize = 7;

/// One entry in a pager line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "page")]
pub enum PageMarker {
    Page(usize),
    Gap,
}

impl fmt::Display for PageMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{}", n),
            Self::Gap => write!(f, "…"),
        }
    }
}

/// Build the compact page list for `current` out of `total` pages
///
/// `total` of zero is treated as one page and `current` is clamped into
/// `[1, total]`, so the result is never empty.
pub fn compact(current: usize, total: usize) -> Vec<PageMarker> {
    let total = total.max(1);
    let current = current.clamp(1, total);

    if total <= FULL_PAGER_LIMIT {
        return (1..=total).map(PageMarker::Page).collect();
    }

    let mut kept = vec![1, 2, total - 1, total, current];
    if current > 3 {
        kept.push(current - 1);
    }
    if current + 1 < total - 1 {
        kept.push(current + 1);
    }
    kept.sort_unstable();
    kept.dedup();

    let mut out = Vec::with_capacity(kept.len() * 2);
    for (i, &page) in kept.iter().enumerate() {
        if i > 0 && page - kept[i - 1] > 1 {
            out.push(PageMarker::Gap);
        }
        out.push(PageMarker::Page(page));
    }
    out
}

/// Number of pages needed for `total_items` rows, never less than one
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total_items.div_ceil(page_size).max(1)
}

/// Pager state for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    current_page: usize,
    page_size: usize,
    total_items: usize,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_items: 0,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total_items, self.page_size)
    }

    /// Update the item count and pull the current page back into range
    pub fn set_total_items(&mut self, total_items: usize) {
        self.total_items = total_items;
        self.current_page = self.current_page.clamp(1, self.total_pages());
    }

    /// Jump to a page, clamped into range
    pub fn go_to(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.total_pages());
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn previous(&mut self) {
        self.go_to(self.current_page.saturating_sub(1));
    }

    pub fn next(&mut self) {
        self.go_to(self.current_page + 1);
    }

    /// Half-open row range of the current page
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }

    pub fn markers(&self) -> Vec<PageMarker> {
        compact(self.current_page, self.total_pages())
    }
}

/// Render a pager line, bracketing the active page: `1 2 [3] 4 … 9`
pub fn render_pager(markers: &[PageMarker], current: usize) -> String {
    markers
        .iter()
        .map(|m| match m {
            PageMarker::Page(n) if *n == current => format!("[{}]", n),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageMarker::{Gap, Page};

    fn pages(markers: &[PageMarker]) -> Vec<usize> {
        markers
            .iter()
            .filter_map(|m| match m {
                Page(n) => Some(*n),
                Gap => None,
            })
            .collect()
    }

    #[test]
    fn test_small_pager_is_full() {
        for total in 1..=7 {
            for current in 1..=total {
                let got = compact(current, total);
                let expected: Vec<_> = (1..=total).map(Page).collect();
                assert_eq!(got, expected, "current={} total={}", current, total);
            }
        }
    }

    #[test]
    fn test_middle_page() {
        assert_eq!(
            compact(10, 20),
            vec![Page(1), Page(2), Gap, Page(9), Page(10), Page(11), Gap, Page(19), Page(20)]
        );
    }

    #[test]
    fn test_first_page() {
        assert_eq!(compact(1, 20), vec![Page(1), Page(2), Gap, Page(19), Page(20)]);
    }

    #[test]
    fn test_last_page() {
        assert_eq!(compact(20, 20), vec![Page(1), Page(2), Gap, Page(19), Page(20)]);
    }

    #[test]
    fn test_near_start() {
        // current-1 == 2 is already an anchor
        assert_eq!(
            compact(3, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Gap, Page(9), Page(10)]
        );
        assert_eq!(
            compact(4, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Gap, Page(9), Page(10)]
        );
    }

    #[test]
    fn test_near_end() {
        assert_eq!(
            compact(8, 10),
            vec![Page(1), Page(2), Gap, Page(7), Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn test_eight_pages_no_redundant_gap() {
        assert_eq!(
            compact(5, 8),
            vec![Page(1), Page(2), Gap, Page(4), Page(5), Page(6), Page(7), Page(8)]
        );
    }

    #[test]
    fn test_out_of_range_inputs() {
        assert_eq!(compact(1, 0), vec![Page(1)]);
        assert_eq!(compact(0, 3), vec![Page(1), Page(2), Page(3)]);
        assert_eq!(compact(99, 20), compact(20, 20));
    }

    #[test]
    fn test_compact_properties() {
        for total in 1..=60 {
            for current in 1..=total {
                let markers = compact(current, total);
                assert_eq!(markers.first(), Some(&Page(1)));
                assert_eq!(markers.last(), Some(&Page(total)));
                assert!(markers.contains(&Page(current)));
                for pair in markers.windows(2) {
                    assert!(!(pair[0] == Gap && pair[1] == Gap));
                }
                let nums = pages(&markers);
                assert!(nums.windows(2).all(|w| w[0] < w[1]));
                // a gap sits exactly where numbers were skipped
                for i in 0..markers.len() - 1 {
                    match (markers[i], markers[i + 1]) {
                        (Page(a), Page(b)) => assert_eq!(b, a + 1),
                        (Page(a), Gap) => match markers[i + 2] {
                            Page(b) => assert!(b > a + 1),
                            Gap => panic!("double gap"),
                        },
                        _ => {}
                    }
                }
            }
        }
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn test_state_clamps_when_items_shrink() {
        let mut state = PaginationState::new(10);
        state.set_total_items(95);
        state.go_to(10);
        assert_eq!(state.current_page(), 10);

        state.set_total_items(25);
        assert_eq!(state.current_page(), 3);

        state.set_total_items(0);
        assert_eq!(state.current_page(), 1);
        assert_eq!(state.range(), 0..0);
    }

    #[test]
    fn test_state_navigation() {
        let mut state = PaginationState::new(10);
        state.set_total_items(25);
        assert!(!state.has_previous());
        state.next();
        state.next();
        state.next();
        assert_eq!(state.current_page(), 3);
        assert!(!state.has_next());
        assert_eq!(state.range(), 20..25);
        state.previous();
        assert_eq!(state.current_page(), 2);
        state.reset();
        assert_eq!(state.current_page(), 1);
    }

    #[test]
    fn test_render_pager() {
        assert_eq!(render_pager(&compact(3, 5), 3), "1 2 [3] 4 5");
        assert_eq!(render_pager(&compact(1, 9), 1), "[1] 2 … 8 9");
    }
}
