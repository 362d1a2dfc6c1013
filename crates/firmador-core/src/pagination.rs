//! Fixed-size page cursor over a filtered list

use std::ops::Range;

/// Rows per page in the document list
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// "first..last of total", 1-based, for the pager caption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub first: usize,
    pub last: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    page: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    /// A zero page size is treated as one row per page
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Keep the cursor inside `[0, page_count - 1]`, or 0 when empty
    pub fn clamp(&mut self, total: usize) {
        let last = self.page_count(total).saturating_sub(1);
        self.page = self.page.min(last);
    }

    pub fn set_page(&mut self, page: usize, total: usize) {
        self.page = page;
        self.clamp(total);
    }

    /// Advance one page; returns false at the last page
    pub fn next(&mut self, total: usize) -> bool {
        if self.page + 1 < self.page_count(total) {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page; returns false at the first page
    pub fn previous(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Index range of the current page, always within `0..total`
    pub fn range(&self, total: usize) -> Range<usize> {
        let start = (self.page * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        start..end
    }

    pub fn summary(&self, total: usize) -> PageSummary {
        let range = self.range(total);
        if range.is_empty() {
            return PageSummary {
                first: 0,
                last: 0,
                total,
            };
        }
        PageSummary {
            first: range.start + 1,
            last: range.end,
            total,
        }
    }
}
