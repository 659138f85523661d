use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pitchside_club::{ClubError, Rating, RatingTally};
use pitchside_core::repository::RatingRepository;
use pitchside_core::RepoResult;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreRatingRepository {
    pool: PgPool,
}

impl StoreRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str, id: Uuid) -> RepoResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(&format!(
            "{} WHERE {} ORDER BY created_at DESC",
            RATING_SELECT, condition
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Rating::try_from).collect::<Result<Vec<_>, _>>()?)
    }
}

const RATING_SELECT: &str =
    "SELECT id, rater_id, player_id, match_id, match_type, score, comment, created_at FROM ratings";

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: Uuid,
    rater_id: Uuid,
    player_id: Uuid,
    match_id: Uuid,
    match_type: String,
    score: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = ClubError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        Ok(Rating {
            id: row.id,
            rater_id: row.rater_id,
            player_id: row.player_id,
            match_id: row.match_id,
            match_type: row.match_type.parse()?,
            score: row.score,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl RatingRepository for StoreRatingRepository {
    async fn create_rating(&self, rating: &Rating) -> RepoResult<RatingTally> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO ratings (id, rater_id, player_id, match_id, match_type, score, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(rating.id)
        .bind(rating.rater_id)
        .bind(rating.player_id)
        .bind(rating.match_id)
        .bind(rating.match_type.as_str())
        .bind(rating.score)
        .bind(&rating.comment)
        .bind(rating.created_at)
        .execute(&mut *tx)
        .await?;

        // right-hand sides see the row as it was before this update
        let (total_ratings, rating_sum, average_rating): (i32, i64, f64) = sqlx::query_as(
            r#"
            UPDATE users SET
                total_ratings = total_ratings + 1,
                rating_sum = rating_sum + $2,
                average_rating = ROUND((rating_sum + $2)::NUMERIC / (total_ratings + 1), 2)::DOUBLE PRECISION,
                updated_at = NOW()
            WHERE id = $1
            RETURNING total_ratings, rating_sum, average_rating
            "#,
        )
        .bind(rating.player_id)
        .bind(rating.score as i64)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RatingTally {
            total_ratings,
            rating_sum,
            average_rating,
        })
    }

    async fn rating_exists(&self, rater_id: Uuid, player_id: Uuid, match_id: Uuid) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ratings WHERE rater_id = $1 AND player_id = $2 AND match_id = $3)",
        )
        .bind(rater_id)
        .bind(player_id)
        .bind(match_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        self.fetch_where("rater_id = $1 OR player_id = $1", user_id).await
    }

    async fn list_received(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        self.fetch_where("player_id = $1", user_id).await
    }

    async fn list_given(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        self.fetch_where("rater_id = $1", user_id).await
    }

    async fn list_for_match(&self, match_id: Uuid) -> RepoResult<Vec<Rating>> {
        self.fetch_where("match_id = $1", match_id).await
    }
}
