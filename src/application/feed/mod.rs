//! Feed coordination: cache-aside reads over the record store and
//! fire-and-forget folding of new advertisements into the snapshot.

mod fold;
mod request;
mod service;

use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

pub use fold::{FoldDispatcher, FoldOutcome};
pub use request::FeedRequest;
pub use service::FeedService;

pub const METRIC_FEED_CACHE_HIT: &str = "listings_feed_cache_hit_total";
pub const METRIC_FEED_CACHE_MISS: &str = "listings_feed_cache_miss_total";
pub const METRIC_FEED_CACHE_ERROR: &str = "listings_feed_cache_error_total";
pub const METRIC_FEED_PAGE_CLAMPED: &str = "listings_feed_page_clamped_total";
pub const METRIC_FEED_FOLD: &str = "listings_feed_fold_total";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("advertisement not found")]
    NotFound,
    #[error("advertisement belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for FeedError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => FeedError::NotFound,
            other => FeedError::Repo(other),
        }
    }
}
