use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pitchside_club::Team;
use pitchside_core::repository::TeamRepository;
use pitchside_core::RepoResult;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

pub struct StoreTeamRepository {
    pool: PgPool,
}

impl StoreTeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches each team's roster, oldest member first.
    async fn with_players(&self, rows: Vec<TeamRow>) -> RepoResult<Vec<Team>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let members: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT team_id, user_id FROM team_players WHERE team_id = ANY($1) ORDER BY joined_at, user_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut rosters: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (team_id, user_id) in members {
            rosters.entry(team_id).or_default().push(user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let players = rosters.remove(&row.id).unwrap_or_default();
                row.into_team(players)
            })
            .collect())
    }

    async fn fetch_one(&self, sql: &str, id: Uuid) -> RepoResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_players(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

const TEAM_SELECT: &str = "SELECT t.id, t.name, t.description, t.logo, t.team_size, t.captain_id, t.wins, t.losses, \
    t.average_rating, t.created_at, t.updated_at FROM teams t";

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    logo: Option<String>,
    team_size: i32,
    captain_id: Uuid,
    wins: i32,
    losses: i32,
    average_rating: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TeamRow {
    fn into_team(self, players: Vec<Uuid>) -> Team {
        Team {
            id: self.id,
            name: self.name,
            description: self.description,
            logo: self.logo,
            team_size: self.team_size,
            captain_id: self.captain_id,
            players,
            wins: self.wins,
            losses: self.losses,
            average_rating: self.average_rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn write_roster(conn: &mut PgConnection, team: &Team) -> RepoResult<()> {
    sqlx::query("DELETE FROM team_players WHERE team_id = $1 AND NOT (user_id = ANY($2))")
        .bind(team.id)
        .bind(&team.players)
        .execute(&mut *conn)
        .await?;

    for player in &team.players {
        sqlx::query(
            "INSERT INTO team_players (team_id, user_id) VALUES ($1, $2) ON CONFLICT (team_id, user_id) DO NOTHING",
        )
        .bind(team.id)
        .bind(player)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TeamRepository for StoreTeamRepository {
    async fn create_team(&self, team: &Team) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, description, logo, team_size, captain_id, wins, losses, average_rating,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(&team.logo)
        .bind(team.team_size)
        .bind(team.captain_id)
        .bind(team.wins)
        .bind(team.losses)
        .bind(team.average_rating)
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&mut *tx)
        .await?;

        write_roster(&mut tx, team).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_team(&self, id: Uuid) -> RepoResult<Option<Team>> {
        self.fetch_one(&format!("{} WHERE t.id = $1", TEAM_SELECT), id).await
    }

    async fn find_team_by_name(&self, name: &str) -> RepoResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!("{} WHERE t.name = $1", TEAM_SELECT))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_players(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_teams(&self) -> RepoResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!("{} ORDER BY t.created_at DESC", TEAM_SELECT))
            .fetch_all(&self.pool)
            .await?;
        self.with_players(rows).await
    }

    async fn save_team(&self, team: &Team) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE teams SET
                name = $2, description = $3, logo = $4, team_size = $5, captain_id = $6, wins = $7, losses = $8,
                average_rating = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(&team.logo)
        .bind(team.team_size)
        .bind(team.captain_id)
        .bind(team.wins)
        .bind(team.losses)
        .bind(team.average_rating)
        .execute(&mut *tx)
        .await?;

        write_roster(&mut tx, team).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_team(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_captained_by(&self, user_id: Uuid) -> RepoResult<Option<Team>> {
        self.fetch_one(&format!("{} WHERE t.captain_id = $1", TEAM_SELECT), user_id).await
    }

    async fn list_member_of(&self, user_id: Uuid) -> RepoResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            "{} WHERE t.captain_id = $1 \
             OR EXISTS (SELECT 1 FROM team_players tp WHERE tp.team_id = t.id AND tp.user_id = $1) \
             ORDER BY t.created_at DESC",
            TEAM_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_players(rows).await
    }
}
