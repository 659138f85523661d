use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pitchside_booking::{BookingError, Reservation, ReservationStatus, TimeOfDay};
use pitchside_core::repository::ReservationRepository;
use pitchside_core::RepoResult;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const RESERVATION_SELECT: &str = "SELECT id, field_id, terrain_id, match_id, user_id, phone_number, date, \
    start_time, end_time, status, status_comment, created_at, updated_at FROM reservations";

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationRow {
    id: Uuid,
    field_id: Uuid,
    terrain_id: Option<Uuid>,
    match_id: Option<Uuid>,
    user_id: Uuid,
    phone_number: Option<String>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    status_comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = BookingError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            field_id: row.field_id,
            terrain_id: row.terrain_id,
            match_id: row.match_id,
            user_id: row.user_id,
            phone_number: row.phone_number,
            date: row.date,
            start_time: TimeOfDay::from_naive(row.start_time),
            end_time: TimeOfDay::from_naive(row.end_time),
            status: row.status.parse()?,
            status_comment: row.status_comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_reservations(rows: Vec<ReservationRow>) -> RepoResult<Vec<Reservation>> {
    Ok(rows
        .into_iter()
        .map(Reservation::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

pub(crate) async fn insert_reservation(conn: &mut PgConnection, r: &Reservation) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations (id, field_id, terrain_id, match_id, user_id, phone_number, date, start_time,
                                  end_time, status, status_comment, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(r.id)
    .bind(r.field_id)
    .bind(r.terrain_id)
    .bind(r.match_id)
    .bind(r.user_id)
    .bind(&r.phone_number)
    .bind(r.date)
    .bind(r.start_time.to_naive())
    .bind(r.end_time.to_naive())
    .bind(r.status.as_str())
    .bind(&r.status_comment)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn write_reservation(conn: &mut PgConnection, r: &Reservation) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE reservations SET
            terrain_id = $2, phone_number = $3, date = $4, start_time = $5, end_time = $6, status = $7,
            status_comment = $8, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(r.id)
    .bind(r.terrain_id)
    .bind(&r.phone_number)
    .bind(r.date)
    .bind(r.start_time.to_naive())
    .bind(r.end_time.to_naive())
    .bind(r.status.as_str())
    .bind(&r.status_comment)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn create_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_reservation(&mut conn, reservation).await
    }

    async fn create_reservations(&self, reservations: &[Reservation]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        for reservation in reservations {
            insert_reservation(&mut tx, reservation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!("{} WHERE id = $1", RESERVATION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Reservation::try_from).transpose()?)
    }

    async fn update_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        let mut conn = self.pool.acquire().await?;
        write_reservation(&mut conn, reservation).await
    }

    async fn delete_reservation(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_field(&self, field_id: Uuid, status: Option<ReservationStatus>) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{} WHERE field_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY date, start_time",
            RESERVATION_SELECT
        ))
        .bind(field_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY date DESC, start_time DESC",
            RESERVATION_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn list_by_field_between(&self, field_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{} WHERE field_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date, start_time",
            RESERVATION_SELECT
        ))
        .bind(field_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn list_approved_on_terrain(&self, terrain_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "{} WHERE terrain_id = $1 AND status = 'APPROVED' AND date BETWEEN $2 AND $3",
            RESERVATION_SELECT
        ))
        .bind(terrain_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn find_by_match(&self, match_id: Uuid) -> RepoResult<Option<Reservation>> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "{} WHERE match_id = $1 ORDER BY created_at DESC LIMIT 1",
            RESERVATION_SELECT
        ))
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Reservation::try_from).transpose()?)
    }

    async fn count_by_status(&self) -> RepoResult<Vec<(ReservationStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM reservations GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await?;
        let mut counts = Vec::with_capacity(rows.len());
        for (status, count) in rows {
            counts.push((status.parse()?, count));
        }
        Ok(counts)
    }
}
