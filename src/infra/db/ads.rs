use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{
    AdListPage, AdListQuery, AdsRepo, RepoError, UpdateAdParams, now_utc,
};
use crate::domain::ads::AdDraft;
use crate::domain::entities::AdvertisementRecord;

use super::types::{AdListRow, AdRow};
use super::{AD_COLUMNS, PostgresRepositories, map_sqlx_error};

#[async_trait]
impl AdsRepo for PostgresRepositories {
    async fn create_advertisement(&self, draft: AdDraft) -> Result<AdvertisementRecord, RepoError> {
        let sql = format!(
            r#"
            WITH a AS (
                INSERT INTO advertisements
                    (id, owner_id, caption, description, image_url, price, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {AD_COLUMNS}
            FROM a
            INNER JOIN users u ON u.id = a.owner_id
            "#
        );

        let row = sqlx::query_as::<_, AdRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(draft.owner_id)
            .bind(draft.caption)
            .bind(draft.description)
            .bind(draft.image_url)
            .bind(draft.price.minor_units())
            .bind(now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        AdvertisementRecord::try_from(row)
    }

    async fn list_advertisements(&self, query: &AdListQuery) -> Result<AdListPage, RepoError> {
        let query = query.normalized();
        let offset = i64::try_from(query.offset())
            .map_err(|_| RepoError::from_persistence("offset exceeds supported range"))?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(AD_COLUMNS);
        qb.push(
            ", COUNT(*) OVER () AS total_count \
             FROM advertisements a \
             INNER JOIN users u ON u.id = a.owner_id \
             WHERE TRUE",
        );
        Self::apply_price_filter(&mut qb, &query);
        qb.push(format!(
            " ORDER BY a.{} {}, a.id DESC",
            query.sort.column(),
            query.order.keyword()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(query.page_size));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<AdListRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        // The window count vanishes with the rows, so an out-of-range page counts separately.
        let total = match rows.first() {
            Some(row) => Self::convert_count(row.total_count)?,
            None if offset > 0 => self.count_advertisements(&query).await?,
            None => 0,
        };

        let items = rows
            .into_iter()
            .map(|row| AdvertisementRecord::try_from(row.ad))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AdListPage { items, total })
    }

    async fn get_advertisement(&self, id: Uuid) -> Result<AdvertisementRecord, RepoError> {
        let sql = format!(
            r#"
            SELECT {AD_COLUMNS}
            FROM advertisements a
            INNER JOIN users u ON u.id = a.owner_id
            WHERE a.id = $1
            "#
        );

        let row = sqlx::query_as::<_, AdRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        AdvertisementRecord::try_from(row)
    }

    async fn update_advertisement(
        &self,
        params: UpdateAdParams,
    ) -> Result<AdvertisementRecord, RepoError> {
        let sql = format!(
            r#"
            WITH a AS (
                UPDATE advertisements
                SET caption = $3,
                    description = $4,
                    image_url = $5,
                    price = $6,
                    updated_at = $7
                WHERE id = $1 AND owner_id = $2
                RETURNING *
            )
            SELECT {AD_COLUMNS}
            FROM a
            INNER JOIN users u ON u.id = a.owner_id
            "#
        );

        let row = sqlx::query_as::<_, AdRow>(&sql)
            .bind(params.id)
            .bind(params.owner_id)
            .bind(params.caption)
            .bind(params.description)
            .bind(params.image_url)
            .bind(params.price.minor_units())
            .bind(now_utc())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        AdvertisementRecord::try_from(row)
    }

    async fn delete_advertisement(&self, id: Uuid, owner_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM advertisements WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

impl PostgresRepositories {
    async fn count_advertisements(&self, query: &AdListQuery) -> Result<u64, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM advertisements a WHERE TRUE");
        Self::apply_price_filter(&mut qb, query);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }
}
