use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pitchside_booking::{Reservation, TimeOfDay};
use pitchside_club::{ClubError, IncompleteMatch};
use pitchside_core::repository::{MatchFilter, MatchRepository};
use pitchside_core::RepoResult;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::reservation_repo::{insert_reservation, write_reservation};

const PLAYER: &str = "PLAYER";
const PENDING: &str = "PENDING";
const INVITED: &str = "INVITED";

pub struct StoreMatchRepository {
    pool: PgPool,
}

impl StoreMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_rosters(&self, rows: Vec<MatchRow>) -> RepoResult<Vec<IncompleteMatch>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let members: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT match_id, user_id, kind FROM match_members WHERE match_id = ANY($1) ORDER BY joined_at, user_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut rosters: HashMap<Uuid, Roster> = HashMap::new();
        for (match_id, user_id, kind) in members {
            let roster = rosters.entry(match_id).or_default();
            match kind.as_str() {
                PLAYER => roster.players.push(user_id),
                PENDING => roster.pending.push(user_id),
                _ => roster.invited.push(user_id),
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roster = rosters.remove(&row.id).unwrap_or_default();
                row.into_match(roster)
            })
            .collect::<Result<Vec<_>, ClubError>>()?)
    }
}

#[derive(Default)]
struct Roster {
    players: Vec<Uuid>,
    pending: Vec<Uuid>,
    invited: Vec<Uuid>,
}

const MATCH_SELECT: &str = "SELECT m.id, m.title, m.city, m.description, m.status, m.contact_phone, m.date, \
    m.start_time, m.end_time, m.is_public, m.creator_id, m.field_id, m.min_age, m.max_age, m.min_skill_level, \
    m.max_skill_level, m.current_players, m.max_players, m.requires_approval, m.created_at, m.updated_at \
    FROM incomplete_matches m";

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: Uuid,
    title: String,
    city: String,
    description: Option<String>,
    status: String,
    contact_phone: Option<String>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_public: bool,
    creator_id: Uuid,
    field_id: Uuid,
    min_age: Option<i32>,
    max_age: Option<i32>,
    min_skill_level: Option<f64>,
    max_skill_level: Option<f64>,
    current_players: i32,
    max_players: i32,
    requires_approval: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MatchRow {
    fn into_match(self, roster: Roster) -> Result<IncompleteMatch, ClubError> {
        Ok(IncompleteMatch {
            id: self.id,
            title: self.title,
            city: self.city,
            description: self.description,
            status: self.status.parse()?,
            contact_phone: self.contact_phone,
            date: self.date,
            start_time: TimeOfDay::from_naive(self.start_time),
            end_time: TimeOfDay::from_naive(self.end_time),
            is_public: self.is_public,
            creator_id: self.creator_id,
            field_id: self.field_id,
            min_age: self.min_age,
            max_age: self.max_age,
            min_skill_level: self.min_skill_level,
            max_skill_level: self.max_skill_level,
            current_players: self.current_players,
            max_players: self.max_players,
            requires_approval: self.requires_approval,
            players: roster.players,
            pending_players: roster.pending,
            invited_players: roster.invited,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Replaces the membership rows, keeping `joined_at` for members whose kind is unchanged.
async fn write_roster(conn: &mut PgConnection, m: &IncompleteMatch) -> RepoResult<()> {
    let mut members: Vec<(Uuid, &str)> = Vec::new();
    members.extend(m.players.iter().map(|id| (*id, PLAYER)));
    members.extend(m.pending_players.iter().map(|id| (*id, PENDING)));
    members.extend(m.invited_players.iter().map(|id| (*id, INVITED)));

    let ids: Vec<Uuid> = members.iter().map(|(id, _)| *id).collect();
    sqlx::query("DELETE FROM match_members WHERE match_id = $1 AND NOT (user_id = ANY($2))")
        .bind(m.id)
        .bind(&ids)
        .execute(&mut *conn)
        .await?;

    for (user_id, kind) in members {
        sqlx::query(
            r#"
            INSERT INTO match_members (match_id, user_id, kind) VALUES ($1, $2, $3)
            ON CONFLICT (match_id, user_id) DO UPDATE
                SET kind = EXCLUDED.kind,
                    joined_at = CASE WHEN match_members.kind = EXCLUDED.kind THEN match_members.joined_at ELSE NOW() END
            "#,
        )
        .bind(m.id)
        .bind(user_id)
        .bind(kind)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl MatchRepository for StoreMatchRepository {
    async fn create_match(&self, created: &IncompleteMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO incomplete_matches (id, title, city, description, status, contact_phone, date, start_time,
                end_time, is_public, creator_id, field_id, min_age, max_age, min_skill_level, max_skill_level,
                current_players, max_players, requires_approval, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
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
        .bind(created.creator_id)
        .bind(created.field_id)
        .bind(created.min_age)
        .bind(created.max_age)
        .bind(created.min_skill_level)
        .bind(created.max_skill_level)
        .bind(created.current_players)
        .bind(created.max_players)
        .bind(created.requires_approval)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *tx)
        .await?;

        write_roster(&mut tx, created).await?;
        insert_reservation(&mut tx, reservation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_match(&self, id: Uuid) -> RepoResult<Option<IncompleteMatch>> {
        let row = sqlx::query_as::<_, MatchRow>(&format!("{} WHERE m.id = $1", MATCH_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_rosters(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_matches(&self, filter: &MatchFilter) -> RepoResult<Vec<IncompleteMatch>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(MATCH_SELECT);
        query.push(" WHERE TRUE");
        if let Some(city) = &filter.city {
            query.push(" AND m.city ILIKE ").push_bind(format!("%{}%", city));
        }
        if let Some(date) = filter.date {
            query.push(" AND m.date = ").push_bind(date);
        }
        if let Some(status) = filter.status {
            query.push(" AND m.status = ").push_bind(status.as_str());
        }
        if let Some(viewer) = filter.viewer {
            query
                .push(" AND (m.is_public OR m.creator_id = ")
                .push_bind(viewer)
                .push(" OR EXISTS (SELECT 1 FROM match_members mm WHERE mm.match_id = m.id AND mm.user_id = ")
                .push_bind(viewer)
                .push("))");
        }
        query.push(" ORDER BY m.date, m.start_time");

        let rows = query.build_query_as::<MatchRow>().fetch_all(&self.pool).await?;
        self.with_rosters(rows).await
    }

    async fn save_match(&self, updated: &IncompleteMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE incomplete_matches SET
                title = $2, city = $3, description = $4, status = $5, contact_phone = $6, date = $7,
                start_time = $8, end_time = $9, is_public = $10, min_age = $11, max_age = $12,
                min_skill_level = $13, max_skill_level = $14, current_players = $15, max_players = $16,
                requires_approval = $17, updated_at = NOW()
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
        .bind(updated.min_age)
        .bind(updated.max_age)
        .bind(updated.min_skill_level)
        .bind(updated.max_skill_level)
        .bind(updated.current_players)
        .bind(updated.max_players)
        .bind(updated.requires_approval)
        .execute(&mut *tx)
        .await?;

        write_roster(&mut tx, updated).await?;
        if let Some(reservation) = reservation {
            write_reservation(&mut tx, reservation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_match(&self, id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reservations WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        // members go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM incomplete_matches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
