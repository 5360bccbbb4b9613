//! Backend contract for the feed snapshot.
//!
//! Backends only move opaque bytes under a key with an expiry. Every stored
//! value carries a version token, and [`FeedStore::compare_and_store`] only
//! writes when the token still matches, so read-modify-write cycles from
//! separate processes cannot overwrite each other. Encoding and bounding live
//! in [`super::FeedCache`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cached feed could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache operation `{op}` timed out")]
    Timeout { op: &'static str },
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Serialization(_) => "serialization",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// A stored payload and the version token it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub payload: Vec<u8>,
    pub version: String,
}

/// Fresh token for a write.
pub fn next_version() -> String {
    Uuid::new_v4().simple().to_string()
}

#[async_trait]
pub trait FeedStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// `None` when the key is absent or expired.
    async fn load(&self, key: &str) -> Result<Option<Versioned>, CacheError>;

    /// Replace the value unconditionally and reset its expiry.
    async fn store(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Replace the value only if its current version is `expected`.
    ///
    /// `expected = None` means the key must be absent or expired. Returns
    /// `false` without writing when another writer got there first.
    async fn compare_and_store(
        &self,
        key: &str,
        expected: Option<&str>,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}
