//! Offset pagination over counted result sets.
//!
//! A [`Paginator`] knows the total row count and the page size. It resolves a
//! raw `page` query value into a [`PageWindow`] under one of two policies:
//! lenient (bad values fall back to a real page) or strict (bad values are
//! reported so the caller can answer with not-found).

use std::num::IntErrorKind;

use thiserror::Error;

use crate::application::repos::PageSlice;

/// Query value accepted by the strict policy for the final page.
pub const LAST_PAGE: &str = "last";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page `{0}` is not an integer")]
    NotAnInteger(String),
    #[error("page {number} is outside 1..={num_pages}")]
    EmptyPage { number: i64, num_pages: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: u64,
    per_page: u64,
}

impl Paginator {
    pub fn new(total: u64, per_page: u64) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    /// Page count; an empty result set still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Parse and range-check a raw page number.
    pub fn validate(&self, raw: &str) -> Result<u64, PaginationError> {
        let trimmed = raw.trim();
        let number = match trimmed.parse::<i64>() {
            Ok(number) => number,
            Err(err) => {
                return Err(match err.kind() {
                    IntErrorKind::PosOverflow => PaginationError::EmptyPage {
                        number: i64::MAX,
                        num_pages: self.num_pages(),
                    },
                    IntErrorKind::NegOverflow => PaginationError::EmptyPage {
                        number: i64::MIN,
                        num_pages: self.num_pages(),
                    },
                    _ => PaginationError::NotAnInteger(raw.to_string()),
                });
            }
        };

        let num_pages = self.num_pages();
        match u64::try_from(number) {
            Ok(value) if (1..=num_pages).contains(&value) => Ok(value),
            _ => Err(PaginationError::EmptyPage { number, num_pages }),
        }
    }

    /// Window for a page number already known to be in range.
    pub fn page(&self, number: u64) -> PageWindow {
        PageWindow {
            number: number.clamp(1, self.num_pages()),
            num_pages: self.num_pages(),
            per_page: self.per_page,
        }
    }

    pub fn last_page(&self) -> PageWindow {
        self.page(self.num_pages())
    }

    /// Missing or non-integer values give page 1; out-of-range values give the last page.
    pub fn page_lenient(&self, raw: Option<&str>) -> PageWindow {
        match self.validate(raw.unwrap_or_default()) {
            Ok(number) => self.page(number),
            Err(PaginationError::NotAnInteger(_)) => self.page(1),
            Err(PaginationError::EmptyPage { .. }) => self.last_page(),
        }
    }

    /// Missing values give page 1 and `last` gives the last page; anything
    /// else must be an in-range integer.
    pub fn page_strict(&self, raw: Option<&str>) -> Result<PageWindow, PaginationError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(self.page(1)),
            Some(LAST_PAGE) => Ok(self.last_page()),
            Some(value) => self.validate(value).map(|number| self.page(number)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub per_page: u64,
}

impl PageWindow {
    pub fn slice(&self) -> PageSlice {
        PageSlice {
            offset: (self.number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then_some(self.number - 1)
    }
}

/// One resolved page of items.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}
