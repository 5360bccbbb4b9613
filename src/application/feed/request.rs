use crate::application::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, parse_page, parse_page_size};
use crate::application::repos::{AdListQuery, SortField, SortOrder};
use crate::domain::ads::Price;
use crate::domain::error::DomainError;

/// A caller's feed query after lenient parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRequest {
    pub sort: SortField,
    pub order: SortOrder,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for FeedRequest {
    fn default() -> Self {
        Self {
            sort: SortField::CreatedAt,
            order: SortOrder::Descending,
            min_price: None,
            max_price: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedRequest {
    /// Parse raw query-string values. Malformed values fall back to defaults;
    /// only an inverted price range is rejected.
    pub fn from_raw(
        page: Option<&str>,
        page_size: Option<&str>,
        sort_by: Option<&str>,
        order: Option<&str>,
        min_price: Option<&str>,
        max_price: Option<&str>,
    ) -> Result<Self, DomainError> {
        let request = Self {
            sort: SortField::parse_lenient(sort_by),
            order: SortOrder::parse_lenient(order),
            min_price: parse_price_bound(min_price),
            max_price: parse_price_bound(max_price),
            page: parse_page(page),
            page_size: parse_page_size(page_size),
        };
        request.validate()?;
        Ok(request)
    }

    /// Clamp page to at least 1 and page size into `1..=MAX_PAGE_SIZE`.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self.page_size = self.page_size.min(MAX_PAGE_SIZE);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(DomainError::validation(
                "min_price",
                "must not exceed max_price",
            ));
        }
        Ok(())
    }

    /// The one shape the snapshot can answer: newest first, first page, unfiltered.
    pub fn matches_snapshot(&self, max_items: usize) -> bool {
        self.sort == SortField::CreatedAt
            && self.order == SortOrder::Descending
            && self.page == 1
            && self.min_price.is_none()
            && self.max_price.is_none()
            && usize::try_from(self.page_size).is_ok_and(|size| size <= max_items)
    }

    pub fn to_store_query(&self) -> AdListQuery {
        AdListQuery {
            sort: self.sort,
            order: self.order,
            min_price: self.min_price,
            max_price: self.max_price,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn parse_price_bound(raw: Option<&str>) -> Option<Price> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|value| Price::new(value).ok())
}
