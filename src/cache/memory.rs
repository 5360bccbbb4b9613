//! Process-local feed store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::lock::{rw_read, rw_write};
use super::store::{CacheError, FeedStore, Versioned, next_version};

const SOURCE: &str = "cache::memory";

struct Entry {
    value: Versioned,
    expires_at: Instant,
}

impl Entry {
    fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value: Versioned {
                payload,
                version: next_version(),
            },
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Keeps serialized snapshots in memory with a deadline per key.
///
/// Expiry uses the tokio clock, so paused-time tests can step over the TTL.
/// Version checks and writes happen under one write lock, which makes
/// `compare_and_store` atomic for every handle sharing the store.
#[derive(Default)]
pub struct MemoryFeedStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<Versioned>, CacheError> {
        let now = Instant::now();
        {
            let entries = rw_read(&self.entries, SOURCE, "load");
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it so the map does not hold dead snapshots.
        let mut entries = rw_write(&self.entries, SOURCE, "load_expire");
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn store(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "store").insert(key.to_string(), Entry::new(payload, ttl));
        Ok(())
    }

    async fn compare_and_store(
        &self,
        key: &str,
        expected: Option<&str>,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "compare_and_store");
        let current = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.version.as_str());
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(payload, ttl));
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "remove").remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
