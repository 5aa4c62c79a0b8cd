//! Document-store gateway.
//!
//! The pipeline only sees these traits; `postgres` is the production backend
//! and `memory` backs the unit tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{NewNotification, Notification, Pond, SensorReading, UserProfile};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

// ---

#[async_trait]
pub trait PondStore: Send + Sync {
    /// Point read of a pond document.
    async fn get_pond(&self, pond_id: &str) -> Result<Option<Pond>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Archive a received reading. Returns `false` if this document was seen before.
    async fn record_reading(&self, reading: &SensorReading, received_at: DateTime<Utc>)
        -> Result<bool>;
}

/// Notification collection, including the inbox lifecycle used by the dashboard.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert and publish to live subscribers.
    async fn insert(&self, new: NewNotification) -> Result<Notification>;

    /// True if a notification with this exact (user, pond, title) was created at or after `since`.
    /// Soft-deleted records count.
    async fn exists_since(
        &self,
        user_id: &str,
        pond_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    /// Newest first, soft-deleted records excluded.
    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Notification>>;

    async fn unread_count(&self, user_id: &str) -> Result<i64>;

    async fn mark_read(&self, id: Uuid) -> Result<bool>;

    async fn mark_all_read(&self, user_id: &str) -> Result<u64>;

    async fn soft_delete(&self, id: Uuid) -> Result<bool>;

    /// Live feed of inserted notifications.
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}

/// Capacity of the in-process notification feed.
pub const EVENT_BUFFER: usize = 256;
