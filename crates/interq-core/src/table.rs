//! Filter, sort and paginate table rows
//!
//! One implementation serves every table. Rows only need a display name to
//! search on and a date to sort by (see [`TableRow`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{FileEntry, ReportRow};
use crate::pagination::{PageMarker, PaginationState};

/// Date sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Ok(Self::Asc),
            "desc" | "descending" | "newest" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort order: {} (use asc or desc)", s)),
        }
    }
}

/// A row that can be shown in a searchable, date-sorted table
pub trait TableRow {
    /// Text the search box matches against
    fn display_name(&self) -> &str;

    /// Date the table sorts by. Rows without a parseable date sort first.
    fn sort_date(&self) -> Option<DateTime<Utc>>;
}

impl TableRow for ReportRow {
    fn display_name(&self) -> &str {
        &self.file_name
    }

    fn sort_date(&self) -> Option<DateTime<Utc>> {
        self.summary.created_at()
    }
}

impl TableRow for FileEntry {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn sort_date(&self) -> Option<DateTime<Utc>> {
        self.uploaded_at()
    }
}

/// Case-insensitive substring match; an empty query matches everything
pub fn matches_query<R: TableRow + ?Sized>(row: &R, query: &str) -> bool {
    let query = query.trim();
    query.is_empty()
        || row
            .display_name()
            .to_lowercase()
            .contains(&query.to_lowercase())
}

/// One rendered page of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a, R> {
    /// Rows on the page, in display order
    pub slice: Vec<&'a R>,
    /// The page actually shown (the request clamped into range)
    pub page: usize,
    pub total_pages: usize,
    /// Rows matching the query across all pages
    pub total_matches: usize,
    pub markers: Vec<PageMarker>,
}

/// Rows matching `query`, sorted by date
fn filter_sorted<'a, R: TableRow>(rows: &'a [R], query: &str, order: SortOrder) -> Vec<&'a R> {
    let mut filtered: Vec<&R> = rows.iter().filter(|r| matches_query(*r, query)).collect();
    filtered.sort_by(|a, b| match order {
        SortOrder::Asc => a.sort_date().cmp(&b.sort_date()),
        SortOrder::Desc => b.sort_date().cmp(&a.sort_date()),
    });
    filtered
}

/// Slice out the pager's current page; the pager must already hold the
/// filtered row count
fn page_of<'a, R>(filtered: &[&'a R], pager: &PaginationState) -> TableView<'a, R> {
    TableView {
        slice: filtered[pager.range()].to_vec(),
        page: pager.current_page(),
        total_pages: pager.total_pages(),
        total_matches: pager.total_items(),
        markers: pager.markers(),
    }
}

/// Filter, sort and slice `rows` for display
///
/// The requested page is clamped into `[1, total_pages]` before slicing; the
/// returned [`TableView::page`] tells the caller which page was rendered.
pub fn view<'a, R: TableRow>(
    rows: &'a [R],
    query: &str,
    order: SortOrder,
    page: usize,
    page_size: usize,
) -> TableView<'a, R> {
    let filtered = filter_sorted(rows, query, order);
    let mut pager = PaginationState::new(page_size);
    pager.set_total_items(filtered.len());
    pager.go_to(page);
    page_of(&filtered, &pager)
}

/// Caller-side table state: search query, sort direction and pager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    query: String,
    order: SortOrder,
    pager: PaginationState,
    /// Page asked for since the last render; clamped once the row count is known
    requested_page: Option<usize>,
}

impl TableState {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            order: SortOrder::default(),
            pager: PaginationState::new(page_size),
            requested_page: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn page(&self) -> usize {
        self.requested_page.unwrap_or(self.pager.current_page())
    }

    pub fn page_size(&self) -> usize {
        self.pager.page_size()
    }

    pub fn pager(&self) -> &PaginationState {
        &self.pager
    }

    /// New search: the result set changes, so start again from page 1
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.requested_page = None;
        self.pager.reset();
    }

    pub fn set_order(&mut self, order: SortOrder) {
        self.order = order;
    }

    pub fn toggle_sort(&mut self) {
        self.order = self.order.toggled();
    }

    /// Request a page. It is clamped on the next render.
    pub fn set_page(&mut self, page: usize) {
        self.requested_page = Some(page.max(1));
    }

    /// Render the current page. The pager takes the filtered row count, so
    /// a page left out of range by a narrower result set is pulled back in.
    pub fn render<'a, R: TableRow>(&mut self, rows: &'a [R]) -> TableView<'a, R> {
        let filtered = filter_sorted(rows, &self.query, self.order);
        self.pager.set_total_items(filtered.len());
        if let Some(page) = self.requested_page.take() {
            self.pager.go_to(page);
        }
        page_of(&filtered, &self.pager)
    }
}
