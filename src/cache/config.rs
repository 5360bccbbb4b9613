//! Feed cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_FEED_ITEMS: usize = 10;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_FOLD_TIMEOUT_MS: u64 = 5_000;

/// Where the feed snapshot lives. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCacheBackend {
    Memory,
    Redis { url: String },
}

#[derive(Debug, Clone)]
pub struct FeedCacheConfig {
    pub backend: FeedCacheBackend,
    /// Lifetime of the snapshot; every write resets it.
    pub ttl: Duration,
    /// Upper bound on snapshot length.
    pub max_items: NonZeroUsize,
    /// Deadline for a single backend round trip.
    pub operation_timeout: Duration,
    /// Deadline for a whole post-create fold.
    pub fold_timeout: Duration,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            backend: FeedCacheBackend::Memory,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_items: NonZeroUsize::new(DEFAULT_MAX_FEED_ITEMS).unwrap_or(NonZeroUsize::MIN),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            fold_timeout: Duration::from_millis(DEFAULT_FOLD_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for FeedCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let backend = match settings.backend {
            crate::config::CacheBackendKind::Memory => FeedCacheBackend::Memory,
            crate::config::CacheBackendKind::Redis => FeedCacheBackend::Redis {
                url: settings.redis_url.clone().unwrap_or_default(),
            },
        };
        Self {
            backend,
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            max_items: settings.max_feed_items,
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms.get()),
            fold_timeout: Duration::from_millis(settings.fold_timeout_ms.get()),
        }
    }
}
