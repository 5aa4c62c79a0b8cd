//! Database schema management for `smikole-alerts`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// `ponds` and `users` are owned by the dashboard's admin side and only read
/// here; `notifications` is written by the alert pipeline and read by the
/// inbox routes; `sensor_readings` archives received trigger documents.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ponds (
            id         TEXT PRIMARY KEY,
            user_id    TEXT,
            name       TEXT,
            sensors    JSONB NOT NULL DEFAULT '[]'::jsonb,
            actuators  JSONB NOT NULL DEFAULT '[]'::jsonb
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            fcm_tokens  TEXT[] NOT NULL DEFAULT '{}'
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // `kolam_id` keeps the dashboard's field name for the pond id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id                 UUID PRIMARY KEY,
            user_id            TEXT        NOT NULL,
            kolam_id           TEXT        NOT NULL,
            title              TEXT        NOT NULL,
            message            TEXT        NOT NULL,
            read               BOOLEAN     NOT NULL DEFAULT FALSE,
            deleted            BOOLEAN     NOT NULL DEFAULT FALSE,
            created_at         TIMESTAMPTZ NOT NULL,
            recommendation_id  TEXT        NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            pond_id      TEXT        NOT NULL,
            doc_id       TEXT        NOT NULL,
            data         JSONB       NOT NULL,
            reading_ts   TIMESTAMPTZ,
            received_at  TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (pond_id, doc_id)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Cooldown lookup: equality on owner, pond, title plus a created_at range
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notifications_cooldown
            ON notifications (user_id, kolam_id, title, created_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notifications_inbox
            ON notifications (user_id, created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
