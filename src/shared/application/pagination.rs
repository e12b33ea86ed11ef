/// Pagination support for list queries
use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 7;
pub const MAX_PER_PAGE: u32 = 100;

/// Page parameters after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Build params from raw query values; absent, non-numeric or zero values
    /// fall back to the defaults and `per_page` is capped at `MAX_PER_PAGE`
    pub fn from_raw(page: Option<&str>, per_page: Option<&str>) -> Self {
        Self {
            page: parse_positive(page).unwrap_or(DEFAULT_PAGE),
            per_page: parse_positive(per_page)
                .unwrap_or(DEFAULT_PER_PAGE)
                .min(MAX_PER_PAGE),
        }
    }

    /// Number of rows to skip: `(page - 1) * per_page`
    pub fn skip(&self) -> AppResult<i64> {
        i64::from(self.page)
            .checked_sub(1)
            .and_then(|pages| pages.checked_mul(i64::from(self.per_page)))
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Page {} with {} items per page is out of range",
                    self.page, self.per_page
                ))
            })
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

/// Paginated result wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_items: u64, per_page: i64) -> Self {
        let per_page = per_page.max(1) as u64;
        Self {
            data,
            total_items,
            total_pages: total_items.div_ceil(per_page),
        }
    }
}
