use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pitchside_booking::{Reservation, TimeOfDay};
use pitchside_club::{ClubError, FullMatch};
use pitchside_core::repository::FullMatchRepository;
use pitchside_core::RepoResult;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::reservation_repo::{insert_reservation, write_reservation};

pub struct StoreFullMatchRepository {
    pool: PgPool,
}

impl StoreFullMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FULL_MATCH_SELECT: &str = "SELECT id, title, city, description, status, contact_phone, date, start_time, \
    end_time, is_public, is_deleted, creator_id, field_id, created_at, updated_at FROM full_matches";

#[derive(sqlx::FromRow)]
struct FullMatchRow {
    id: Uuid,
    title: String,
    city: String,
    description: Option<String>,
    status: String,
    contact_phone: String,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_public: bool,
    is_deleted: bool,
    creator_id: Uuid,
    field_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FullMatchRow> for FullMatch {
    type Error = ClubError;

    fn try_from(row: FullMatchRow) -> Result<Self, Self::Error> {
        Ok(FullMatch {
            id: row.id,
            title: row.title,
            city: row.city,
            description: row.description,
            status: row.status.parse()?,
            contact_phone: row.contact_phone,
            date: row.date,
            start_time: TimeOfDay::from_naive(row.start_time),
            end_time: TimeOfDay::from_naive(row.end_time),
            is_public: row.is_public,
            is_deleted: row.is_deleted,
            creator_id: row.creator_id,
            field_id: row.field_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl FullMatchRepository for StoreFullMatchRepository {
    async fn create_full_match(&self, created: &FullMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO full_matches (id, title, city, description, status, contact_phone, date, start_time,
                end_time, is_public, is_deleted, creator_id, field_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(created.id)
        .bind(&created.title)
        .bind(&created.city)
        .bind(&created.description)
        .bind(created.status.as_str())
        .bind(&created.contact_phone)
        .bind(created.date)
        .bind(created.start_time.to_naive())
        .bind(created.end_time.to_naive())
        .bind(created.is_public)
        .bind(created.is_deleted)
        .bind(created.creator_id)
        .bind(created.field_id)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_reservation(&mut tx, reservation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_full_match(&self, id: Uuid) -> RepoResult<Option<FullMatch>> {
        let row = sqlx::query_as::<_, FullMatchRow>(&format!(
            "{} WHERE id = $1 AND NOT is_deleted",
            FULL_MATCH_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FullMatch::try_from).transpose()?)
    }

    async fn list_full_matches(&self, creator: Option<Uuid>) -> RepoResult<Vec<FullMatch>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(FULL_MATCH_SELECT);
        query.push(" WHERE NOT is_deleted");
        if let Some(creator) = creator {
            query.push(" AND creator_id = ").push_bind(creator);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query.build_query_as::<FullMatchRow>().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(FullMatch::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn save_full_match(&self, updated: &FullMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE full_matches SET
                title = $2, city = $3, description = $4, status = $5, contact_phone = $6, date = $7,
                start_time = $8, end_time = $9, is_public = $10, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(updated.id)
        .bind(&updated.title)
        .bind(&updated.city)
        .bind(&updated.description)
        .bind(updated.status.as_str())
        .bind(&updated.contact_phone)
        .bind(updated.date)
        .bind(updated.start_time.to_naive())
        .bind(updated.end_time.to_naive())
        .bind(updated.is_public)
        .execute(&mut *tx)
        .await?;

        if let Some(reservation) = reservation {
            write_reservation(&mut tx, reservation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn retire_full_match(&self, retired: &FullMatch) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE full_matches SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(retired.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reservations WHERE match_id = $1")
            .bind(retired.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
