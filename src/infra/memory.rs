//! In-process record store for tests and single-node demos.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    AdListPage, AdListQuery, AdsRepo, CreateUserParams, RepoError, SortField, SortOrder,
    StoreHealth, UpdateAdParams, UsersRepo, now_utc,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::ads::AdDraft;
use crate::domain::entities::{AdvertisementRecord, UserRecord};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    ads: HashMap<Uuid, AdvertisementRecord>,
    last_created: Option<OffsetDateTime>,
}

impl State {
    /// Creation stamps are strictly increasing so newest-first order is total.
    fn next_created_at(&mut self) -> OffsetDateTime {
        let now = now_utc();
        let stamp = match self.last_created {
            Some(last) if now <= last => last + Duration::nanoseconds(1),
            _ => now,
        };
        self.last_created = Some(stamp);
        stamp
    }
}

#[derive(Default)]
pub struct InMemoryRepositories {
    state: RwLock<State>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertisement_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "advertisement_count").ads.len()
    }
}

#[async_trait]
impl AdsRepo for InMemoryRepositories {
    async fn create_advertisement(&self, draft: AdDraft) -> Result<AdvertisementRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "create_advertisement");
        let owner = state
            .users
            .get(&draft.owner_id)
            .ok_or_else(|| RepoError::from_persistence("owner does not exist"))?;

        let owner_id = owner.id;
        let owner_username = owner.username.clone();
        let created_at = state.next_created_at();
        let record = AdvertisementRecord {
            id: Uuid::new_v4(),
            owner_id,
            owner_username,
            caption: draft.caption,
            description: draft.description,
            image_url: draft.image_url,
            price: draft.price,
            created_at,
            updated_at: None,
        };
        state.ads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_advertisements(&self, query: &AdListQuery) -> Result<AdListPage, RepoError> {
        let query = query.normalized();
        let state = rw_read(&self.state, SOURCE, "list_advertisements");

        let mut matching: Vec<&AdvertisementRecord> = state
            .ads
            .values()
            .filter(|ad| query.min_price.is_none_or(|min| ad.price >= min))
            .filter(|ad| query.max_price.is_none_or(|max| ad.price <= max))
            .collect();
        matching.sort_by(|a, b| compare(a, b, query.sort, query.order));

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok(AdListPage { items, total })
    }

    async fn get_advertisement(&self, id: Uuid) -> Result<AdvertisementRecord, RepoError> {
        rw_read(&self.state, SOURCE, "get_advertisement")
            .ads
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn update_advertisement(
        &self,
        params: UpdateAdParams,
    ) -> Result<AdvertisementRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "update_advertisement");
        let ad = state
            .ads
            .get_mut(&params.id)
            .filter(|ad| ad.owner_id == params.owner_id)
            .ok_or(RepoError::NotFound)?;

        ad.caption = params.caption;
        ad.description = params.description;
        ad.image_url = params.image_url;
        ad.price = params.price;
        ad.updated_at = Some(now_utc());
        Ok(ad.clone())
    }

    async fn delete_advertisement(&self, id: Uuid, owner_id: Uuid) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_advertisement");
        match state.ads.get(&id) {
            Some(ad) if ad.owner_id == owner_id => {
                state.ads.remove(&id);
                Ok(())
            }
            _ => Err(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "create_user");
        if state
            .users
            .values()
            .any(|user| user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: now_utc(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_user_by_username")
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }
}

#[async_trait]
impl StoreHealth for InMemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

fn compare(
    a: &AdvertisementRecord,
    b: &AdvertisementRecord,
    sort: SortField,
    order: SortOrder,
) -> Ordering {
    let primary = match sort {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Price => a.price.cmp(&b.price),
    };
    let primary = match order {
        SortOrder::Ascending => primary,
        SortOrder::Descending => primary.reverse(),
    };
    primary.then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ads::Price;

    async fn seeded() -> (InMemoryRepositories, Uuid) {
        let repo = InMemoryRepositories::new();
        let user = repo
            .create_user(CreateUserParams {
                username: "seller".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .expect("user");
        for price in [300, 100, 200] {
            repo.create_advertisement(AdDraft {
                owner_id: user.id,
                caption: format!("Item {price}"),
                description: "desc".to_string(),
                image_url: None,
                price: Price::new(price).expect("price"),
            })
            .await
            .expect("ad");
        }
        (repo, user.id)
    }

    fn query(sort: SortField, order: SortOrder) -> AdListQuery {
        AdListQuery {
            sort,
            order,
            min_price: None,
            max_price: None,
            page: 1,
            page_size: 10,
        }
    }

    #[tokio::test]
    async fn price_sort_and_inclusive_bounds() {
        let (repo, _) = seeded().await;

        let page = repo
            .list_advertisements(&query(SortField::Price, SortOrder::Ascending))
            .await
            .expect("list");
        let prices: Vec<i64> = page.items.iter().map(|ad| ad.price.minor_units()).collect();
        assert_eq!(prices, vec![100, 200, 300]);

        let filtered = AdListQuery {
            min_price: Some(Price::new(200).expect("price")),
            max_price: Some(Price::new(300).expect("price")),
            ..query(SortField::Price, SortOrder::Descending)
        };
        let page = repo.list_advertisements(&filtered).await.expect("list");
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].price.minor_units(), 300);
    }

    #[tokio::test]
    async fn total_ignores_pagination() {
        let (repo, _) = seeded().await;
        let page = repo
            .list_advertisements(&AdListQuery {
                page: 5,
                page_size: 2,
                ..query(SortField::CreatedAt, SortOrder::Descending)
            })
            .await
            .expect("list");
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn writes_are_scoped_to_owner() {
        let (repo, owner) = seeded().await;
        let ad = repo
            .list_advertisements(&query(SortField::CreatedAt, SortOrder::Descending))
            .await
            .expect("list")
            .items
            .remove(0);

        let stranger = Uuid::new_v4();
        assert!(matches!(
            repo.delete_advertisement(ad.id, stranger).await,
            Err(RepoError::NotFound)
        ));
        repo.delete_advertisement(ad.id, owner)
            .await
            .expect("owner delete");
        assert_eq!(repo.advertisement_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (repo, _) = seeded().await;
        let err = repo
            .create_user(CreateUserParams {
                username: "seller".to_string(),
                password_hash: "y".to_string(),
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }
}
