//! Redis-backed feed store shared by every service instance.
//!
//! The snapshot lives in a hash with a `data` and a `ver` field. Conditional
//! writes run as one server-side script, so the version check and the write
//! are atomic across processes. The connection is opened on first use; the
//! caller bounds every call, the connect included.

use std::time::Duration;

use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::info;

use super::store::{CacheError, FeedStore, Versioned, next_version};

const DATA_FIELD: &str = "data";
const VERSION_FIELD: &str = "ver";

const COMPARE_AND_STORE: &str = r"
local current = redis.call('HGET', KEYS[1], 'ver')
if current == false then current = '' end
if current ~= ARGV[1] then return 0 end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'data', ARGV[2], 'ver', ARGV[3])
redis.call('PEXPIRE', KEYS[1], ARGV[4])
return 1
";

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::unavailable(err)
    }
}

pub struct RedisFeedStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    swap_script: Script,
}

impl RedisFeedStore {
    /// Validate the URL without touching the network.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            swap_script: Script::new(COMPARE_AND_STORE),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!(
                    target = "listings::cache::redis",
                    "Connected to Redis feed cache"
                );
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl FeedStore for RedisFeedStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn load(&self, key: &str) -> Result<Option<Versioned>, CacheError> {
        let mut conn = self.connection().await?;
        let (payload, version): (Option<Vec<u8>>, Option<String>) = redis::cmd("HMGET")
            .arg(key)
            .arg(DATA_FIELD)
            .arg(VERSION_FIELD)
            .query_async(&mut conn)
            .await?;
        Ok(payload
            .zip(version)
            .map(|(payload, version)| Versioned { payload, version }))
    }

    async fn store(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(key)
            .ignore()
            .cmd("HSET")
            .arg(key)
            .arg(DATA_FIELD)
            .arg(payload)
            .arg(VERSION_FIELD)
            .arg(next_version())
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn compare_and_store(
        &self,
        key: &str,
        expected: Option<&str>,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let written: i64 = self
            .swap_script
            .key(key)
            .arg(expected.unwrap_or_default())
            .arg(payload)
            .arg(next_version())
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(written == 1)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheError::Unavailable(format!(
                "unexpected PING reply `{reply}`"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use super::*;
    use crate::cache::{FeedCache, FeedCacheConfig};

    #[test]
    fn malformed_url_is_rejected_up_front() {
        assert!(RedisFeedStore::new("not a redis url").is_err());
    }

    #[test]
    fn ttl_is_never_rounded_to_zero() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }

    #[tokio::test]
    async fn unreachable_server_fails_operations_within_the_timeout() {
        let store = RedisFeedStore::new("redis://127.0.0.1:1").expect("valid url");
        let config = FeedCacheConfig {
            max_items: NonZeroUsize::new(3).expect("non-zero"),
            operation_timeout: Duration::from_millis(200),
            ..FeedCacheConfig::default()
        };
        let cache = FeedCache::new(Arc::new(store), &config);

        let ping = tokio::time::timeout(Duration::from_secs(5), cache.ping())
            .await
            .expect("ping bounded by the operation timeout");
        assert!(ping.is_err());

        let read = tokio::time::timeout(Duration::from_secs(5), cache.get())
            .await
            .expect("read bounded by the operation timeout");
        assert!(read.is_err());
    }
}
