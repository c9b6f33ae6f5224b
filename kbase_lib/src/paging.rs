//! Client-side pagination, and pagination composed with sorting.

use crate::sorting::{SortOrder, Sortable, Sorter};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Items per page. Zero means [`DEFAULT_PAGE_SIZE`].
    pub page_size: usize,
    /// Upper bound on reachable pages. `None` or zero means unbounded.
    pub max_pages: Option<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

impl PaginationConfig {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn effective_page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Highest reachable page for `total_items`; zero for an empty list.
    fn ceiling(&self, total_items: usize) -> usize {
        let total_pages = total_items.div_ceil(self.effective_page_size());
        match self.max_pages {
            Some(max) if max > 0 => max.min(total_pages),
            _ => total_pages,
        }
    }
}

/// One window over a list.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    /// Effective page count, after `max_pages`.
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Current page over a list whose length may change between views.
///
/// Every operation clamps the page into `[1, max(1, ceiling)]`, where the
/// ceiling is `min(max_pages, total_pages)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paginator {
    config: PaginationConfig,
    current_page: usize,
    /// List length from the most recent operation.
    last_total: Option<usize>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            current_page: 1,
            last_total: None,
        }
    }

    pub fn config(&self) -> PaginationConfig {
        self.config
    }

    pub fn page_size(&self) -> usize {
        self.config.effective_page_size()
    }

    /// Current page, clamped against the last list length seen.
    pub fn current_page(&self) -> usize {
        match self.last_total {
            Some(total_items) => self.clamp(self.current_page as i64, total_items),
            None => self.current_page,
        }
    }

    fn clamp(&self, page: i64, total_items: usize) -> usize {
        let upper = self.config.ceiling(total_items).max(1);
        page.clamp(1, upper as i64) as usize
    }

    /// Windows `items`, first re-clamping the current page in case the list
    /// shrank.
    pub fn page<T: Clone>(&mut self, items: &[T]) -> Page<T> {
        let total_items = items.len();
        self.go_to_page(self.current_page as i64, total_items);

        let page_size = self.page_size();
        let total_pages = self.config.ceiling(total_items);
        let start = ((self.current_page - 1) * page_size).min(total_items);
        let end = (start + page_size).min(total_items);

        Page {
            items: items[start..end].to_vec(),
            current_page: self.current_page,
            page_size,
            total_items,
            total_pages,
            has_next_page: self.current_page < total_pages,
            has_previous_page: self.current_page > 1,
        }
    }

    pub fn go_to_page(&mut self, page: i64, total_items: usize) {
        self.current_page = self.clamp(page, total_items);
        self.last_total = Some(total_items);
    }

    pub fn next_page(&mut self, total_items: usize) {
        let current = self.clamp(self.current_page as i64, total_items);
        self.go_to_page(current as i64 + 1, total_items);
    }

    pub fn previous_page(&mut self, total_items: usize) {
        let current = self.clamp(self.current_page as i64, total_items);
        self.go_to_page(current as i64 - 1, total_items);
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }
}

/// Sorting then pagination, so page boundaries follow display order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginatedSorting {
    sorter: Sorter,
    paginator: Paginator,
}

impl PaginatedSorting {
    pub fn new(config: PaginationConfig, default_sort_key: Option<&str>) -> Self {
        Self {
            sorter: Sorter::new(default_sort_key),
            paginator: Paginator::new(config),
        }
    }

    pub fn view<'a, T: Sortable>(&mut self, items: &'a [T]) -> Page<&'a T> {
        let sorted = self.sorter.sorted(items);
        self.paginator.page(&sorted)
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sorter.sort_key()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sorter.sort_order()
    }

    pub fn toggle_sort(&mut self, key: &str) {
        self.sorter.toggle_sort(key);
    }

    pub fn current_page(&self) -> usize {
        self.paginator.current_page()
    }

    pub fn go_to_page(&mut self, page: i64, total_items: usize) {
        self.paginator.go_to_page(page, total_items);
    }

    pub fn next_page(&mut self, total_items: usize) {
        self.paginator.next_page(total_items);
    }

    pub fn previous_page(&mut self, total_items: usize) {
        self.paginator.previous_page(total_items);
    }

    /// Back to page 1 and unsorted.
    pub fn reset(&mut self) {
        self.paginator.reset();
        self.sorter.reset();
    }
}
