//! In-memory store used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{NotificationStore, PondStore, ReadingStore, UserStore, EVENT_BUFFER};
use crate::models::{NewNotification, Notification, Pond, SensorReading, UserProfile};

// ---

pub struct MemoryStore {
    ponds: Mutex<HashMap<String, Pond>>,
    users: Mutex<HashMap<String, UserProfile>>,
    notifications: Mutex<Vec<Notification>>,
    readings: Mutex<Vec<(String, String)>>,
    reject_inserts: AtomicBool,
    rejected_titles: Mutex<HashSet<String>>,
    events: broadcast::Sender<Notification>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        // ---
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            ponds: Mutex::default(),
            users: Mutex::default(),
            notifications: Mutex::default(),
            readings: Mutex::default(),
            reject_inserts: AtomicBool::new(false),
            rejected_titles: Mutex::default(),
            events,
        }
    }
}

impl MemoryStore {
    pub fn put_pond(&self, pond: Pond) {
        self.ponds.lock().unwrap().insert(pond.id.clone(), pond);
    }

    pub fn put_user(&self, user_id: &str, tokens: &[&str]) {
        // ---
        let profile = UserProfile {
            id: user_id.to_string(),
            fcm_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        };
        self.users.lock().unwrap().insert(profile.id.clone(), profile);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// Make every following insert fail, as if the store went away.
    pub fn reject_inserts(&self, reject: bool) {
        self.reject_inserts.store(reject, Ordering::SeqCst);
    }

    /// Fail inserts of notifications carrying this exact title.
    pub fn reject_title(&self, title: &str) {
        self.rejected_titles.lock().unwrap().insert(title.to_string());
    }
}

#[async_trait]
impl PondStore for MemoryStore {
    async fn get_pond(&self, pond_id: &str) -> Result<Option<Pond>> {
        Ok(self.ponds.lock().unwrap().get(pond_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn record_reading(
        &self,
        reading: &SensorReading,
        _received_at: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        let key = (reading.pond_id.clone(), reading.doc_id.clone());
        let mut readings = self.readings.lock().unwrap();
        if readings.contains(&key) {
            return Ok(false);
        }
        readings.push(key);
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        // ---
        if self.reject_inserts.load(Ordering::SeqCst)
            || self.rejected_titles.lock().unwrap().contains(&new.title)
        {
            return Err(anyhow!("notification store unavailable"));
        }
        let notification = new.into_notification();
        self.notifications.lock().unwrap().push(notification.clone());
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
        Ok(self.notifications.lock().unwrap().iter().any(|n| {
            n.user_id == user_id && n.pond_id == pond_id && n.title == title && n.created_at >= since
        }))
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Notification>> {
        // ---
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id && !n.deleted)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn unread_count(&self, user_id: &str) -> Result<i64> {
        // ---
        let count = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id && !n.read && !n.deleted)
            .count();
        Ok(count as i64)
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        // ---
        let mut rows = self.notifications.lock().unwrap();
        match rows.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        // ---
        let mut updated = 0;
        for n in self.notifications.lock().unwrap().iter_mut() {
            if n.user_id == user_id && !n.read && !n.deleted {
                n.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        // ---
        let mut rows = self.notifications.lock().unwrap();
        match rows.iter_mut().find(|n| n.id == id && !n.deleted) {
            Some(n) => {
                n.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}
