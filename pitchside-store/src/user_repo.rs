use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pitchside_core::repository::UserRepository;
use pitchside_core::{RepoResult, Role, User};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreUserRepository {
    pool: PgPool,
}

impl StoreUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, refresh_token_hash, role, city, \
    phone_number, profile_picture, bio, date_of_birth, is_replacement_player, is_active, total_ratings, rating_sum, \
    average_rating, reset_code_hash, reset_code_expires_at, reset_attempts, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    refresh_token_hash: Option<String>,
    role: String,
    city: Option<String>,
    phone_number: Option<String>,
    profile_picture: Option<String>,
    bio: Option<String>,
    date_of_birth: Option<NaiveDate>,
    is_replacement_player: bool,
    is_active: bool,
    total_ratings: i32,
    rating_sum: i64,
    average_rating: f64,
    reset_code_hash: Option<String>,
    reset_code_expires_at: Option<DateTime<Utc>>,
    reset_attempts: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = pitchside_core::CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token_hash: row.refresh_token_hash,
            role: row.role.parse()?,
            city: row.city,
            phone_number: row.phone_number,
            profile_picture: row.profile_picture,
            bio: row.bio,
            date_of_birth: row.date_of_birth,
            is_replacement_player: row.is_replacement_player,
            is_active: row.is_active,
            total_ratings: row.total_ratings,
            rating_sum: row.rating_sum,
            average_rating: row.average_rating,
            reset_code_hash: row.reset_code_hash,
            reset_code_expires_at: row.reset_code_expires_at,
            reset_attempts: row.reset_attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> RepoResult<Vec<User>> {
    rows.into_iter()
        .map(|row| User::try_from(row).map_err(Into::into))
        .collect()
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn create_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, role, city, phone_number,
                               date_of_birth, is_replacement_player, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.city)
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .bind(user.is_replacement_player)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn save_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                first_name = $2, last_name = $3, email = $4, password_hash = $5, refresh_token_hash = $6,
                role = $7, city = $8, phone_number = $9, profile_picture = $10, bio = $11, date_of_birth = $12,
                is_replacement_player = $13, is_active = $14, total_ratings = $15, rating_sum = $16,
                average_rating = $17, reset_code_hash = $18, reset_code_expires_at = $19,
                reset_attempts = $20, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.refresh_token_hash)
        .bind(user.role.as_str())
        .bind(&user.city)
        .bind(&user.phone_number)
        .bind(&user.profile_picture)
        .bind(&user.bio)
        .bind(user.date_of_birth)
        .bind(user.is_replacement_player)
        .bind(user.is_active)
        .bind(user.total_ratings)
        .bind(user.rating_sum)
        .bind(user.average_rating)
        .bind(&user.reset_code_hash)
        .bind(user.reset_code_expires_at)
        .bind(user.reset_attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, role: Option<Role>) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;
        into_users(rows)
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        into_users(rows)
    }

    async fn search_players(&self, exclude: Uuid, search: Option<&str>) -> RepoResult<Vec<User>> {
        let pattern = search.map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {} FROM users
            WHERE role = 'PLAYER' AND is_active AND id <> $1
              AND ($2::TEXT IS NULL
                   OR first_name ILIKE $2 OR last_name ILIKE $2 OR email ILIKE $2
                   OR (first_name || ' ' || last_name) ILIKE $2)
            ORDER BY first_name, last_name
            "#,
            USER_COLUMNS
        ))
        .bind(exclude)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        into_users(rows)
    }

    async fn count_by_role(&self) -> RepoResult<Vec<(Role, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = Vec::with_capacity(rows.len());
        for (role, count) in rows {
            counts.push((role.parse()?, count));
        }
        Ok(counts)
    }
}
