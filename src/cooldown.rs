//! Duplicate-alert suppression backed by the notification history.
//!
//! Suppression is keyed on the exact (owner, pond, title) triple. The check
//! and the later insert are not atomic, so two concurrent readings can both
//! pass; the guard is best-effort by construction of the store.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::store::NotificationStore;

// ---

#[derive(Debug, Clone, Copy)]
pub struct CooldownGuard {
    window: Duration,
}

impl CooldownGuard {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(Duration::minutes(i64::from(minutes)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether an identical alert was already recorded in the window ending at `now`.
    pub async fn is_active(
        &self,
        store: &dyn NotificationStore,
        owner: &str,
        pond_id: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        if self.window <= Duration::zero() {
            return Ok(false);
        }
        store
            .exists_since(owner, pond_id, title, now - self.window)
            .await
    }
}
