use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pitchside_core::notification::Notification;
use pitchside_core::repository::NotificationRepository;
use pitchside_core::{CoreError, RepoResult};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreNotificationRepository {
    pool: PgPool,
}

impl StoreNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    kind: String,
    related_id: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            kind: row.kind.parse()?,
            related_id: row.related_id,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for StoreNotificationRepository {
    async fn create_notification(&self, notification: &Notification) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message, kind, related_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(&notification.related_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, is_read: Option<bool>) -> RepoResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, title, message, kind, related_id, is_read, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2::BOOLEAN IS NULL OR is_read = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(is_read)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::try_from).collect::<Result<Vec<_>, _>>()?)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: Uuid) -> RepoResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
