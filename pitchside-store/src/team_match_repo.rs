use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pitchside_booking::{Reservation, TimeOfDay};
use pitchside_club::{ClubError, TeamMatch};
use pitchside_core::repository::TeamMatchRepository;
use pitchside_core::RepoResult;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::reservation_repo::{insert_reservation, write_reservation};

const PENDING: &str = "PENDING";
const INVITED: &str = "INVITED";

pub struct StoreTeamMatchRepository {
    pool: PgPool,
}

impl StoreTeamMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches the pending and invited team lists, oldest first.
    async fn with_entries(&self, rows: Vec<TeamMatchRow>) -> RepoResult<Vec<TeamMatch>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let entries: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT match_id, team_id, kind FROM team_match_teams WHERE match_id = ANY($1) ORDER BY added_at, team_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lists: HashMap<Uuid, Entries> = HashMap::new();
        for (match_id, team_id, kind) in entries {
            let list = lists.entry(match_id).or_default();
            if kind == PENDING {
                list.pending.push(team_id);
            } else {
                list.invited.push(team_id);
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let entries = lists.remove(&row.id).unwrap_or_default();
                row.into_match(entries)
            })
            .collect::<Result<Vec<_>, ClubError>>()?)
    }
}

#[derive(Default)]
struct Entries {
    pending: Vec<Uuid>,
    invited: Vec<Uuid>,
}

const TEAM_MATCH_SELECT: &str = "SELECT id, title, city, description, status, contact_phone, date, start_time, \
    end_time, is_public, creator_id, field_id, team_id, opponent_team_id, min_age, max_age, min_skill_level, \
    max_skill_level, team_size, created_at, updated_at FROM team_matches";

#[derive(sqlx::FromRow)]
struct TeamMatchRow {
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
    creator_id: Uuid,
    field_id: Uuid,
    team_id: Uuid,
    opponent_team_id: Option<Uuid>,
    min_age: Option<i32>,
    max_age: Option<i32>,
    min_skill_level: Option<f64>,
    max_skill_level: Option<f64>,
    team_size: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TeamMatchRow {
    fn into_match(self, entries: Entries) -> Result<TeamMatch, ClubError> {
        Ok(TeamMatch {
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
            team_id: self.team_id,
            opponent_team_id: self.opponent_team_id,
            pending_teams: entries.pending,
            invited_teams: entries.invited,
            min_age: self.min_age,
            max_age: self.max_age,
            min_skill_level: self.min_skill_level,
            max_skill_level: self.max_skill_level,
            team_size: self.team_size,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Replaces the pending and invited rows, keeping `added_at` for unchanged entries.
async fn write_entries(conn: &mut PgConnection, m: &TeamMatch) -> RepoResult<()> {
    let mut entries: Vec<(Uuid, &str)> = Vec::new();
    entries.extend(m.pending_teams.iter().map(|id| (*id, PENDING)));
    entries.extend(m.invited_teams.iter().map(|id| (*id, INVITED)));

    let ids: Vec<Uuid> = entries.iter().map(|(id, _)| *id).collect();
    sqlx::query("DELETE FROM team_match_teams WHERE match_id = $1 AND NOT (team_id = ANY($2))")
        .bind(m.id)
        .bind(&ids)
        .execute(&mut *conn)
        .await?;

    for (team_id, kind) in entries {
        sqlx::query(
            r#"
            INSERT INTO team_match_teams (match_id, team_id, kind) VALUES ($1, $2, $3)
            ON CONFLICT (match_id, team_id) DO UPDATE
                SET kind = EXCLUDED.kind,
                    added_at = CASE WHEN team_match_teams.kind = EXCLUDED.kind
                                    THEN team_match_teams.added_at ELSE NOW() END
            "#,
        )
        .bind(m.id)
        .bind(team_id)
        .bind(kind)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TeamMatchRepository for StoreTeamMatchRepository {
    async fn create_team_match(&self, created: &TeamMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO team_matches (id, title, city, description, status, contact_phone, date, start_time,
                end_time, is_public, creator_id, field_id, team_id, opponent_team_id, min_age, max_age,
                min_skill_level, max_skill_level, team_size, created_at, updated_at)
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
        .bind(created.team_id)
        .bind(created.opponent_team_id)
        .bind(created.min_age)
        .bind(created.max_age)
        .bind(created.min_skill_level)
        .bind(created.max_skill_level)
        .bind(created.team_size)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *tx)
        .await?;

        write_entries(&mut tx, created).await?;
        insert_reservation(&mut tx, reservation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_team_match(&self, id: Uuid) -> RepoResult<Option<TeamMatch>> {
        let row = sqlx::query_as::<_, TeamMatchRow>(&format!("{} WHERE id = $1", TEAM_MATCH_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_entries(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_team_matches(&self) -> RepoResult<Vec<TeamMatch>> {
        let rows = sqlx::query_as::<_, TeamMatchRow>(&format!("{} ORDER BY date, start_time", TEAM_MATCH_SELECT))
            .fetch_all(&self.pool)
            .await?;
        self.with_entries(rows).await
    }

    async fn save_team_match(&self, updated: &TeamMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE team_matches SET
                title = $2, city = $3, description = $4, status = $5, contact_phone = $6, date = $7,
                start_time = $8, end_time = $9, is_public = $10, opponent_team_id = $11, min_age = $12,
                max_age = $13, min_skill_level = $14, max_skill_level = $15, team_size = $16, updated_at = NOW()
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
        .bind(updated.opponent_team_id)
        .bind(updated.min_age)
        .bind(updated.max_age)
        .bind(updated.min_skill_level)
        .bind(updated.max_skill_level)
        .bind(updated.team_size)
        .execute(&mut *tx)
        .await?;

        write_entries(&mut tx, updated).await?;
        if let Some(reservation) = reservation {
            write_reservation(&mut tx, reservation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_team_match(&self, id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reservations WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM team_matches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
