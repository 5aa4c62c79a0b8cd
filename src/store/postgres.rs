//! PostgreSQL backend for all store traits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{NotificationStore, PondStore, ReadingStore, UserStore, EVENT_BUFFER};
use crate::models::{NewNotification, Notification, Pond, SensorReading, UserProfile};

// ---

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kolam_id, title, message, read, deleted, created_at, recommendation_id";

/// Channel used for `pg_notify`, so observers in other processes see new notifications.
pub const NOTIFY_CHANNEL: &str = "notifications";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    events: broadcast::Sender<Notification>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        // ---
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { pool, events }
    }
}

#[async_trait]
impl PondStore for PgStore {
    async fn get_pond(&self, pond_id: &str) -> Result<Option<Pond>> {
        // ---
        let pond = sqlx::query_as::<_, Pond>(
            r#"
            SELECT id, user_id, name, sensors, actuators
            FROM ponds
            WHERE id = $1
            "#,
        )
        .bind(pond_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load pond '{}'", pond_id))?;

        Ok(pond)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        // ---
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, fcm_tokens
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load user '{}'", user_id))?;

        Ok(user)
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn record_reading(
        &self,
        reading: &SensorReading,
        received_at: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        let result = sqlx::query(
            r#"
            INSERT INTO sensor_readings (pond_id, doc_id, data, reading_ts, received_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (pond_id, doc_id) DO NOTHING
            "#,
        )
        .bind(&reading.pond_id)
        .bind(&reading.doc_id)
        .bind(sqlx::types::Json(&reading.values))
        .bind(reading.timestamp)
        .bind(received_at)
        .execute(&self.pool)
        .await
        .context("Failed to archive sensor reading")?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        // ---
        let mut tx = self.pool.begin().await?;

        let notification = new.into_notification();
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, kolam_id, title, message,
                read, deleted, created_at, recommendation_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(&notification.pond_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.deleted)
        .bind(notification.created_at)
        .bind(&notification.recommendation_id)
        .execute(&mut *tx)
        .await
        .context("Failed to insert notification")?;

        let payload = serde_json::to_string(&notification)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // No receivers is fine
        let _ = self.events.send(notification.clone());
        Ok(notification)
    }

    async fn exists_since(
        &self,
        user_id: &str,
        pond_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        let found: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1
            FROM notifications
            WHERE user_id = $1
              AND kolam_id = $2
              AND title = $3
              AND created_at >= $4
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(pond_id)
        .bind(title)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query recent notifications")?;

        Ok(found.is_some())
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Notification>> {
        // ---
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND NOT deleted
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn unread_count(&self, user_id: &str) -> Result<i64> {
        // ---
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE user_id = $1 AND NOT read AND NOT deleted
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        // ---
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        // ---
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read AND NOT deleted",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        // ---
        let result =
            sqlx::query("UPDATE notifications SET deleted = TRUE WHERE id = $1 AND NOT deleted")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}
