//! List envelope shared by every paginated endpoint:
//! `{ "data": [...], "pagination": { "page", "limit", "total", "totalPages" } }`.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(ApiError::validation("page must be >= 1"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::validation("page is out of range"));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: Page, total: i64) -> Self {
        let total = total.max(0);
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: (total + page.limit - 1) / page.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            data,
            pagination: Pagination::new(page, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// `%term%` for ILIKE, or `None` when the search box is empty.
pub fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_ten() {
        let p = Page::new(None, None).unwrap();
        assert_eq!(p, Page { page: 1, limit: 10 });
        assert_eq!(p.offset(), 0);
        assert_eq!(Page::new(Some(3), Some(20)).unwrap().offset(), 40);
    }

    #[test]
    fn rejects_out_of_range_pages() {
        assert!(Page::new(Some(0), None).is_err());
        assert!(Page::new(None, Some(0)).is_err());
        assert!(Page::new(None, Some(MAX_LIMIT + 1)).is_err());
    }

    #[test]
    fn rejects_pages_whose_offset_overflows() {
        assert!(Page::new(Some(i64::MAX), Some(10)).is_err());
        assert!(Page::new(Some(i64::MAX / 10), Some(MAX_LIMIT)).is_err());

        let last = Page::new(Some(i64::MAX / MAX_LIMIT), Some(MAX_LIMIT)).unwrap();
        assert!(last.offset() > 0);
    }

    #[test]
    fn sort_order_accepts_either_case() {
        let upper: SortOrder = serde_json::from_str(r#""DESC""#).unwrap();
        let lower: SortOrder = serde_json::from_str(r#""desc""#).unwrap();
        assert_eq!(upper, SortOrder::Desc);
        assert_eq!(lower, SortOrder::Desc);
        let asc: SortOrder = serde_json::from_str(r#""ASC""#).unwrap();
        assert_eq!(asc, SortOrder::Asc);
        assert!(serde_json::from_str::<SortOrder>(r#""sideways""#).is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Page::new(Some(1), Some(10)).unwrap();
        assert_eq!(Pagination::new(p, 0).total_pages, 0);
        assert_eq!(Pagination::new(p, 10).total_pages, 1);
        assert_eq!(Pagination::new(p, 11).total_pages, 2);
    }

    #[test]
    fn envelope_uses_camel_case_total_pages() {
        let p = Page::new(Some(2), Some(5)).unwrap();
        let json = serde_json::to_value(Paginated::new(vec![1, 2], p, 7)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": [1, 2],
                "pagination": {"page": 2, "limit": 5, "total": 7, "totalPages": 2}
            })
        );
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(Some("09:")), Some("%09:%".into()));
        assert_eq!(like_pattern(Some("50%")), Some("%50\\%%".into()));
    }
}
