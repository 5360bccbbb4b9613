//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{DEFAULT_PAGE_SIZE, page_offset};
use crate::domain::ads::{AdDraft, Price};
use crate::domain::entities::{AdvertisementRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Price,
}

impl SortField {
    /// Unrecognized values fall back to `created_at`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("price") => Self::Price,
            _ => Self::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Price => "price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Unrecognized values fall back to descending.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("asc") => Self::Ascending,
            _ => Self::Descending,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Store-level listing request. Price bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdListQuery {
    pub sort: SortField,
    pub order: SortOrder,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub page: u32,
    pub page_size: u32,
}

impl AdListQuery {
    /// Clamp `page` to at least 1 and replace a zero `page_size` with the default.
    pub fn normalized(mut self) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        if self.page_size < 1 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self
    }

    pub fn offset(&self) -> u64 {
        page_offset(self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdListPage {
    pub items: Vec<AdvertisementRecord>,
    /// Rows matching the filter, ignoring pagination.
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct UpdateAdParams {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub caption: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: Price,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait AdsRepo: Send + Sync {
    async fn create_advertisement(&self, draft: AdDraft) -> Result<AdvertisementRecord, RepoError>;

    async fn list_advertisements(&self, query: &AdListQuery) -> Result<AdListPage, RepoError>;

    /// Fails with `NotFound` when no advertisement has this id.
    async fn get_advertisement(&self, id: Uuid) -> Result<AdvertisementRecord, RepoError>;

    /// Scoped by id and owner; fails with `NotFound` when zero rows match.
    async fn update_advertisement(
        &self,
        params: UpdateAdParams,
    ) -> Result<AdvertisementRecord, RepoError>;

    /// Scoped by id and owner; fails with `NotFound` when zero rows match.
    async fn delete_advertisement(&self, id: Uuid, owner_id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Fails with `Duplicate` when the username is taken.
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

pub(crate) fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_falls_back_to_created_at() {
        assert_eq!(SortField::parse_lenient(Some("price")), SortField::Price);
        assert_eq!(SortField::parse_lenient(Some("PRICE")), SortField::Price);
        assert_eq!(SortField::parse_lenient(Some("caption")), SortField::CreatedAt);
        assert_eq!(SortField::parse_lenient(None), SortField::CreatedAt);
    }

    #[test]
    fn sort_order_falls_back_to_descending() {
        assert_eq!(SortOrder::parse_lenient(Some("asc")), SortOrder::Ascending);
        assert_eq!(SortOrder::parse_lenient(Some("ASC")), SortOrder::Ascending);
        assert_eq!(SortOrder::parse_lenient(Some("sideways")), SortOrder::Descending);
        assert_eq!(SortOrder::parse_lenient(None), SortOrder::Descending);
    }

    #[test]
    fn normalized_query_clamps_page_and_size() {
        let query = AdListQuery {
            sort: SortField::CreatedAt,
            order: SortOrder::Descending,
            min_price: None,
            max_price: None,
            page: 0,
            page_size: 0,
        }
        .normalized();

        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }
}
