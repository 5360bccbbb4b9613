//! Per-caller projection of advertisements.
//!
//! Shared data (store rows and the cached feed snapshot) is never caller-specific.
//! Ownership is computed here, on the way out, for whichever caller is asking.

use uuid::Uuid;

use crate::domain::entities::AdvertisementRecord;

/// An advertisement as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdView {
    pub record: AdvertisementRecord,
    /// `None` for anonymous callers, otherwise whether the caller owns the ad.
    pub is_owner: Option<bool>,
}

pub fn shape_one(record: AdvertisementRecord, caller: Option<Uuid>) -> AdView {
    let is_owner = caller.map(|caller| caller == record.owner_id);
    AdView { record, is_owner }
}

pub fn shape(records: Vec<AdvertisementRecord>, caller: Option<Uuid>) -> Vec<AdView> {
    records
        .into_iter()
        .map(|record| shape_one(record, caller))
        .collect()
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::ads::Price;

    fn record(owner_id: Uuid) -> AdvertisementRecord {
        AdvertisementRecord {
            id: Uuid::new_v4(),
            owner_id,
            owner_username: "seller".to_string(),
            caption: "Bike".to_string(),
            description: "Red bike".to_string(),
            image_url: None,
            price: Price::ZERO,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
        }
    }

    #[test]
    fn anonymous_caller_gets_no_ownership_flag() {
        let view = shape_one(record(Uuid::new_v4()), None);
        assert_eq!(view.is_owner, None);
    }

    #[test]
    fn ownership_is_computed_per_record() {
        let caller = Uuid::new_v4();
        let views = shape(vec![record(caller), record(Uuid::new_v4())], Some(caller));
        let flags: Vec<_> = views.iter().map(|view| view.is_owner).collect();
        assert_eq!(flags, vec![Some(true), Some(false)]);
    }

    #[test]
    fn shaping_leaves_shared_record_untouched() {
        let original = record(Uuid::new_v4());
        let view = shape_one(original.clone(), Some(Uuid::new_v4()));
        assert_eq!(view.record, original);
    }
}
