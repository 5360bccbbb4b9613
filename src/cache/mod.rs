//! Feed cache
//!
//! Holds the bounded "recent ads" snapshot in front of the record store.
//! The backend is picked once from configuration:
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! max_feed_items = 10
//! ttl_seconds = 86400
//! ```

mod config;
mod feed;
pub(crate) mod lock;
mod memory;
mod redis_store;
mod store;

use std::sync::Arc;

pub use config::{FeedCacheBackend, FeedCacheConfig};
pub use feed::{FEED_KEY, FeedCache, Snapshot, SnapshotVersion};
pub use memory::MemoryFeedStore;
pub use redis_store::RedisFeedStore;
pub use store::{CacheError, FeedStore, Versioned};

/// Build the configured backend.
///
/// No network I/O happens here; only a malformed Redis URL fails.
pub fn connect(config: &FeedCacheConfig) -> Result<Arc<dyn FeedStore>, CacheError> {
    match &config.backend {
        FeedCacheBackend::Memory => Ok(Arc::new(MemoryFeedStore::new())),
        FeedCacheBackend::Redis { url } => Ok(Arc::new(RedisFeedStore::new(url)?)),
    }
}
