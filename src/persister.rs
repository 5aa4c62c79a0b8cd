//! Writes alerts to the notification collection.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::composer::Alert;
use crate::models::{NewNotification, Notification};
use crate::store::NotificationStore;

// ---

/// Persist an alert for its owner as an unread, non-deleted notification.
///
/// `created_at` is the persistence time, not the reading's timestamp; the
/// cooldown guard compares against it. Store errors propagate to the caller.
pub async fn persist(
    store: &dyn NotificationStore,
    owner: &str,
    alert: &Alert,
    now: DateTime<Utc>,
) -> Result<Notification> {
    // ---
    let notification = store
        .insert(NewNotification {
            user_id: owner.to_string(),
            pond_id: alert.pond_id.clone(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            created_at: now,
            recommendation_id: String::new(),
        })
        .await?;

    info!(
        id = %notification.id,
        user_id = owner,
        pond_id = %alert.pond_id,
        "Notification stored: {}",
        notification.title
    );
    Ok(notification)
}
