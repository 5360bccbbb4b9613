use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::pagination::{NumberedPage, total_pages};
use crate::application::repos::{AdListQuery, AdsRepo, RepoError, UpdateAdParams};
use crate::application::shaping::{AdView, shape, shape_one};
use crate::cache::{CacheError, FeedCache, Snapshot, SnapshotVersion};
use crate::domain::ads::{AdChanges, AdDraft};
use crate::domain::entities::AdvertisementRecord;

use super::fold::FoldDispatcher;
use super::request::FeedRequest;
use super::{
    FeedError, METRIC_FEED_CACHE_ERROR, METRIC_FEED_CACHE_HIT, METRIC_FEED_CACHE_MISS,
    METRIC_FEED_PAGE_CLAMPED,
};

const SOURCE: &str = "listings::feed";

/// Entry point for every advertisement read and write.
///
/// The record store is authoritative. The snapshot only ever answers the
/// newest-first first page and is filled lazily on a miss.
#[derive(Clone)]
pub struct FeedService {
    ads: Arc<dyn AdsRepo>,
    cache: Arc<FeedCache>,
    folds: FoldDispatcher,
    store_timeout: Duration,
}

impl FeedService {
    pub fn new(
        ads: Arc<dyn AdsRepo>,
        cache: Arc<FeedCache>,
        folds: FoldDispatcher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            ads,
            cache,
            folds,
            store_timeout,
        }
    }

    pub fn folds(&self) -> &FoldDispatcher {
        &self.folds
    }

    /// Serve one page of the feed.
    ///
    /// Only a newest-first first page with no price filter and a page size
    /// within `max_items` can be answered from the snapshot.
    ///
    /// On a hit, `total` and `total_pages` count the snapshot, not the store,
    /// so they are capped at `max_items` and can differ from what a miss for
    /// the same request reports. Every other request, and every miss, reports
    /// store totals.
    pub async fn list_feed(
        &self,
        request: FeedRequest,
        caller: Option<Uuid>,
    ) -> Result<NumberedPage<AdView>, FeedError> {
        let request = request.normalized();
        request.validate()?;

        if !request.matches_snapshot(self.cache.max_items()) {
            return self.list_from_store(request, caller).await;
        }

        let page_size = request.page_size as usize;
        let snapshot = self.read_snapshot().await;
        match snapshot.ads {
            Some(ads) if ads.len() >= page_size => {
                counter!(METRIC_FEED_CACHE_HIT).increment(1);
                let total = ads.len() as u64;
                let items = ads.into_iter().take(page_size).collect();
                return Ok(NumberedPage::new(
                    shape(items, caller),
                    1,
                    request.page_size,
                    total,
                ));
            }
            Some(ads) => debug!(
                target = SOURCE,
                cached = ads.len(),
                requested = page_size,
                "Feed snapshot shorter than requested page"
            ),
            None => {}
        }

        counter!(METRIC_FEED_CACHE_MISS).increment(1);
        self.warm_and_list(request, caller, &snapshot.version).await
    }

    pub async fn get_advertisement(
        &self,
        id: Uuid,
        caller: Option<Uuid>,
    ) -> Result<AdView, FeedError> {
        let record = self
            .within("get_advertisement", self.ads.get_advertisement(id))
            .await?;
        Ok(shape_one(record, caller))
    }

    /// Persist first; the snapshot is folded in the background only after the write commits.
    pub async fn create_advertisement(&self, draft: AdDraft) -> Result<AdView, FeedError> {
        let owner = draft.owner_id;
        let record = self
            .within("create_advertisement", self.ads.create_advertisement(draft))
            .await?;

        info!(
            target = SOURCE,
            ad_id = %record.id,
            owner_id = %owner,
            "Advertisement created"
        );

        self.folds.dispatch(record.clone());
        Ok(shape_one(record, Some(owner)))
    }

    /// Does not touch the snapshot. Cached copies are replaced by the next
    /// warm, by TTL expiry or by invalidation.
    pub async fn update_advertisement(
        &self,
        id: Uuid,
        caller: Uuid,
        changes: AdChanges,
    ) -> Result<AdView, FeedError> {
        let current = self
            .within("get_advertisement", self.ads.get_advertisement(id))
            .await?;
        if current.owner_id != caller {
            return Err(FeedError::Forbidden);
        }

        let params = merge_changes(current, changes);
        let record = self
            .within("update_advertisement", self.ads.update_advertisement(params))
            .await?;

        info!(target = SOURCE, ad_id = %id, owner_id = %caller, "Advertisement updated");
        Ok(shape_one(record, Some(caller)))
    }

    /// Missing and not-owned are indistinguishable to the caller.
    pub async fn delete_advertisement(&self, id: Uuid, caller: Uuid) -> Result<(), FeedError> {
        self.within(
            "delete_advertisement",
            self.ads.delete_advertisement(id, caller),
        )
        .await?;

        info!(target = SOURCE, ad_id = %id, owner_id = %caller, "Advertisement deleted");
        Ok(())
    }

    /// Drop the snapshot; the next default read repopulates it from the store.
    pub async fn invalidate_feed(&self) -> Result<(), CacheError> {
        self.cache.invalidate().await
    }

    pub async fn cache_health(&self) -> Result<(), CacheError> {
        self.cache.ping().await
    }

    async fn read_snapshot(&self) -> Snapshot {
        match self.cache.read().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                counter!(METRIC_FEED_CACHE_ERROR, "kind" => err.kind()).increment(1);
                warn!(
                    target = SOURCE,
                    error = %err,
                    "Feed cache read failed; serving from record store"
                );
                Snapshot::default()
            }
        }
    }

    async fn warm_and_list(
        &self,
        request: FeedRequest,
        caller: Option<Uuid>,
        seen: &SnapshotVersion,
    ) -> Result<NumberedPage<AdView>, FeedError> {
        let warm_query = AdListQuery {
            page: 1,
            page_size: u32::try_from(self.cache.max_items()).unwrap_or(u32::MAX),
            ..request.to_store_query()
        };
        let page = self
            .within("list_advertisements", self.ads.list_advertisements(&warm_query))
            .await?;

        if let Err(err) = self.cache.refresh(page.items.clone(), seen).await {
            counter!(METRIC_FEED_CACHE_ERROR, "kind" => err.kind()).increment(1);
            warn!(target = SOURCE, error = %err, "Feed cache warm failed");
        }

        let items = page
            .items
            .into_iter()
            .take(request.page_size as usize)
            .collect();
        Ok(NumberedPage::new(
            shape(items, caller),
            1,
            request.page_size,
            page.total,
        ))
    }

    async fn list_from_store(
        &self,
        request: FeedRequest,
        caller: Option<Uuid>,
    ) -> Result<NumberedPage<AdView>, FeedError> {
        let mut query = request.to_store_query().normalized();
        let mut page = self
            .within("list_advertisements", self.ads.list_advertisements(&query))
            .await?;

        let last_page = total_pages(page.total, query.page_size);
        if last_page > 0 && u64::from(query.page) > last_page {
            debug!(
                target = SOURCE,
                requested = query.page,
                last_page,
                "Requested page beyond range; clamping to last page"
            );
            counter!(METRIC_FEED_PAGE_CLAMPED).increment(1);
            query.page = u32::try_from(last_page).unwrap_or(u32::MAX);
            page = self
                .within("list_advertisements", self.ads.list_advertisements(&query))
                .await?;
        }

        Ok(NumberedPage::new(
            shape(page.items, caller),
            query.page,
            query.page_size,
            page.total,
        ))
    }

    async fn within<T>(
        &self,
        op: &'static str,
        operation: impl Future<Output = Result<T, RepoError>>,
    ) -> Result<T, RepoError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    target = SOURCE,
                    op,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Record store operation timed out"
                );
                Err(RepoError::Timeout)
            }
        }
    }
}

fn merge_changes(current: AdvertisementRecord, changes: AdChanges) -> UpdateAdParams {
    UpdateAdParams {
        id: current.id,
        owner_id: current.owner_id,
        caption: changes.caption.unwrap_or(current.caption),
        description: changes.description.unwrap_or(current.description),
        image_url: changes.image_url.or(current.image_url),
        price: changes.price.unwrap_or(current.price),
    }
}
