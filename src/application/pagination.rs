//! Page-number pagination shared by every feed.
//!
//! Requested page numbers never fail: anything unparsable falls back to the
//! first page and out-of-range numbers clamp to the nearest valid page.

use serde::Serialize;

/// Number of posts shown per feed page.
pub const FEED_PAGE_SIZE: u32 = 10;

/// Offset/limit window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total_items: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total_items: u64, per_page: u32) -> Self {
        Self {
            total_items,
            per_page: per_page.max(1),
        }
    }

    /// Total number of pages; an empty collection still has one empty page.
    pub fn num_pages(&self) -> u32 {
        if self.total_items == 0 {
            return 1;
        }
        let pages = self.total_items.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Resolve a raw `?page=` value to a valid page number.
    pub fn resolve(&self, requested: Option<&str>) -> u32 {
        let last = self.num_pages();
        let Some(raw) = requested.map(str::trim).filter(|value| !value.is_empty()) else {
            return 1;
        };
        if raw.eq_ignore_ascii_case("last") {
            return last;
        }
        match raw.parse::<i64>() {
            Ok(number) if number < 1 => 1,
            Ok(number) => u32::try_from(number).map_or(last, |value| value.min(last)),
            Err(_) => 1,
        }
    }

    pub fn window(&self, number: u32) -> PageWindow {
        let number = number.clamp(1, self.num_pages());
        PageWindow {
            offset: u64::from(number - 1) * u64::from(self.per_page),
            limit: self.per_page,
        }
    }

    pub fn page<T>(&self, number: u32, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: number.clamp(1, self.num_pages()),
            num_pages: self.num_pages(),
            total_items: self.total_items,
            per_page: self.per_page,
        }
    }
}

/// One page of results plus the metadata templates need for navigation.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total_items: u64,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_items: self.total_items,
            per_page: self.per_page,
        }
    }
}
