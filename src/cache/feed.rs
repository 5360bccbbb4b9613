//! The recent-ads snapshot.
//!
//! A single key holds at most `max_items` advertisements, newest first.
//! Writes that depend on the current snapshot are optimistic: load the value
//! and its version, edit, then `compare_and_store` against that version and
//! retry on conflict. The backend enforces the check, so writers in separate
//! processes cannot lose each other's prepends. Writers inside one process
//! also queue on a local lock.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::entities::AdvertisementRecord;

use super::config::FeedCacheConfig;
use super::store::{CacheError, FeedStore};

pub const FEED_KEY: &str = "feed:latest";

const SOURCE: &str = "listings::cache::feed";

/// Which stored snapshot a reader saw. Default means "saw nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotVersion(Option<String>);

/// A decoded snapshot together with the version it was read at.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub ads: Option<Vec<AdvertisementRecord>>,
    pub version: SnapshotVersion,
}

pub struct FeedCache {
    store: Arc<dyn FeedStore>,
    max_items: NonZeroUsize,
    ttl: Duration,
    operation_timeout: Duration,
    writer: Mutex<()>,
}

impl FeedCache {
    pub fn new(store: Arc<dyn FeedStore>, config: &FeedCacheConfig) -> Self {
        Self {
            store,
            max_items: config.max_items,
            ttl: config.ttl,
            operation_timeout: config.operation_timeout,
            writer: Mutex::new(()),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items.get()
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Current snapshot, or `None` when absent or expired.
    pub async fn get(&self) -> Result<Option<Vec<AdvertisementRecord>>, CacheError> {
        Ok(self.read().await?.ads)
    }

    /// Like [`FeedCache::get`], but also reports the version for a later [`FeedCache::refresh`].
    pub async fn read(&self) -> Result<Snapshot, CacheError> {
        let Some(value) = self.bounded("get", self.store.load(FEED_KEY)).await? else {
            return Ok(Snapshot::default());
        };
        let ads = serde_json::from_slice(&value.payload)?;
        Ok(Snapshot {
            ads: Some(ads),
            version: SnapshotVersion(Some(value.version)),
        })
    }

    /// Overwrite the snapshot, truncated to `max_items`, and reset the TTL.
    pub async fn set(&self, mut ads: Vec<AdvertisementRecord>) -> Result<(), CacheError> {
        let _guard = self.writer.lock().await;
        ads.truncate(self.max_items());
        let payload = serde_json::to_vec(&ads)?;
        self.bounded("set", self.store.store(FEED_KEY, payload, self.ttl))
            .await?;
        debug!(target = SOURCE, items = ads.len(), "Feed snapshot written");
        Ok(())
    }

    /// Prepend one advertisement and trim the tail. An absent snapshot starts empty.
    ///
    /// Returns the snapshot length after the fold.
    pub async fn fold(&self, ad: AdvertisementRecord) -> Result<usize, CacheError> {
        let snapshot = self
            .update("fold", |mut snapshot| {
                snapshot.retain(|existing| existing.id != ad.id);
                snapshot.insert(0, ad.clone());
                snapshot
            })
            .await?;
        Ok(snapshot.len())
    }

    /// Replace the snapshot with a freshly queried newest-first page.
    ///
    /// `seen` is the version observed before the page was queried. If nothing
    /// wrote since, the page replaces the snapshot wholesale. Otherwise the
    /// page still wins for every id it contains, and only cached entries
    /// created after the page's newest record survive: those are folds that
    /// landed while the page was being read.
    pub async fn refresh(
        &self,
        mut page: Vec<AdvertisementRecord>,
        seen: &SnapshotVersion,
    ) -> Result<(), CacheError> {
        {
            let _guard = self.writer.lock().await;
            page.truncate(self.max_items());
            if self.swap("refresh", seen.0.as_deref(), &page).await? {
                return Ok(());
            }
        }

        debug!(
            target = SOURCE,
            "Feed snapshot changed during refresh; reconciling"
        );
        self.update("refresh", |snapshot| reconcile(snapshot, &page))
            .await?;
        Ok(())
    }

    pub async fn invalidate(&self) -> Result<(), CacheError> {
        let _guard = self.writer.lock().await;
        self.bounded("invalidate", self.store.remove(FEED_KEY)).await
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.bounded("ping", self.store.ping()).await
    }

    /// Read-edit-write until the write lands on the version it was computed from.
    ///
    /// Every lost race means another writer committed, so the loop ends once
    /// contention drains. An undecodable stored value is edited as empty.
    async fn update<F>(
        &self,
        op: &'static str,
        mut edit: F,
    ) -> Result<Vec<AdvertisementRecord>, CacheError>
    where
        F: FnMut(Vec<AdvertisementRecord>) -> Vec<AdvertisementRecord>,
    {
        let _guard = self.writer.lock().await;
        loop {
            let current = self.bounded("get", self.store.load(FEED_KEY)).await?;
            let (snapshot, expected) = match current {
                Some(value) => (self.decode_for_write(op, &value.payload), Some(value.version)),
                None => (Vec::new(), None),
            };

            let mut next = edit(snapshot);
            next.truncate(self.max_items());
            if self.swap(op, expected.as_deref(), &next).await? {
                return Ok(next);
            }

            debug!(target = SOURCE, op, "Feed snapshot version moved; retrying");
            tokio::task::yield_now().await;
        }
    }

    fn decode_for_write(&self, op: &'static str, payload: &[u8]) -> Vec<AdvertisementRecord> {
        match serde_json::from_slice(payload) {
            Ok(ads) => ads,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op,
                    error = %err,
                    "Discarding undecodable feed snapshot"
                );
                Vec::new()
            }
        }
    }

    async fn swap(
        &self,
        op: &'static str,
        expected: Option<&str>,
        ads: &[AdvertisementRecord],
    ) -> Result<bool, CacheError> {
        let payload = serde_json::to_vec(ads)?;
        let written = self
            .bounded(
                "set",
                self.store
                    .compare_and_store(FEED_KEY, expected, payload, self.ttl),
            )
            .await?;
        if written {
            debug!(target = SOURCE, op, items = ads.len(), "Feed snapshot written");
        }
        Ok(written)
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| CacheError::Timeout { op })?
    }
}

/// Store page first; cached entries newer than the whole page are kept.
fn reconcile(
    cached: Vec<AdvertisementRecord>,
    page: &[AdvertisementRecord],
) -> Vec<AdvertisementRecord> {
    let newest_in_page: Option<OffsetDateTime> = page.iter().map(|ad| ad.created_at).max();

    let mut merged: Vec<AdvertisementRecord> = cached
        .into_iter()
        .filter(|ad| newest_in_page.is_some_and(|newest| ad.created_at > newest))
        .collect();
    merged.extend(page.iter().cloned());
    merged.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    merged
}
