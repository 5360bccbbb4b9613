use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::RepoError;
use crate::domain::ads::Price;
use crate::domain::entities::{AdvertisementRecord, UserRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct AdRow {
    pub(crate) id: Uuid,
    pub(crate) owner_id: Uuid,
    pub(crate) owner_username: String,
    pub(crate) caption: String,
    pub(crate) description: String,
    pub(crate) image_url: Option<String>,
    pub(crate) price: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: Option<OffsetDateTime>,
}

impl TryFrom<AdRow> for AdvertisementRecord {
    type Error = RepoError;

    fn try_from(row: AdRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price).map_err(RepoError::from_persistence)?;
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            owner_username: row.owner_username,
            caption: row.caption,
            description: row.description,
            image_url: row.image_url,
            price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AdListRow {
    #[sqlx(flatten)]
    pub(crate) ad: AdRow,
    pub(crate) total_count: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub(crate) id: Uuid,
    pub(crate) username: String,
    pub(crate) password_hash: String,
    pub(crate) created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}
