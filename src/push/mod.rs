//! Push fan-out to every registered device of an alert's owner.
//!
//! Delivery is best-effort: each token is attempted concurrently under its
//! own timeout, failures are logged per token and folded into a
//! [`FanoutReport`], and nothing here ever fails the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::Notification;
use crate::store::UserStore;

mod fcm;

pub use fcm::FcmSender;

// ---

/// In-app route opened when the push is tapped.
pub const ALERT_URL: &str = "/notifikasi";

/// `data.type` tag carried by every sensor alert push.
pub const ALERT_TYPE: &str = "sensor_alert";

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push delivery is not configured")]
    Disabled,

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The device token is expired or unregistered.
    #[error("device token is no longer registered")]
    InvalidToken,

    #[error("push service rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("push request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushData {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Payload sent once per device token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub notification: PushNotification,
    pub data: PushData,
}

impl PushMessage {
    pub fn for_notification(notification: &Notification) -> Self {
        // ---
        Self {
            notification: PushNotification {
                title: notification.title.clone(),
                body: notification.message.clone(),
            },
            data: PushData {
                url: ALERT_URL.to_string(),
                kind: ALERT_TYPE.to_string(),
            },
        }
    }
}

/// A push delivery backend.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError>;

    fn name(&self) -> &str;
}

/// Sender used when no push backend is configured.
#[derive(Debug, Default)]
pub struct DisabledSender;

#[async_trait]
impl PushSender for DisabledSender {
    async fn send(&self, _token: &str, _message: &PushMessage) -> Result<(), PushError> {
        Err(PushError::Disabled)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub token: String,
    pub result: Result<(), PushError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    /// Masked device token.
    pub token: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl FanoutReport {
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        // ---
        let failures: Vec<DeliveryFailure> = outcomes
            .iter()
            .filter_map(|o| {
                o.result.as_ref().err().map(|e| DeliveryFailure {
                    token: mask_token(&o.token),
                    reason: e.to_string(),
                })
            })
            .collect();

        Self {
            attempted: outcomes.len(),
            delivered: outcomes.len() - failures.len(),
            failures,
        }
    }
}

pub struct PushFanout {
    sender: Arc<dyn PushSender>,
    timeout: Duration,
}

impl PushFanout {
    pub fn new(sender: Arc<dyn PushSender>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Deliver a stored notification to every device of `user_id`.
    ///
    /// A missing profile or an empty token list is a no-op.
    pub async fn deliver(
        &self,
        users: &dyn UserStore,
        user_id: &str,
        notification: &Notification,
    ) -> FanoutReport {
        // ---
        let tokens: Vec<String> = match users.get_user(user_id).await {
            Ok(Some(profile)) => profile
                .fcm_tokens
                .into_iter()
                .filter(|t| !t.trim().is_empty())
                .collect(),
            Ok(None) => {
                debug!(user_id, "No user profile, skipping push");
                return FanoutReport::default();
            }
            Err(e) => {
                warn!(user_id, "Failed to load device tokens, skipping push: {:#}", e);
                return FanoutReport::default();
            }
        };

        if tokens.is_empty() {
            debug!(user_id, "User has no registered devices");
            return FanoutReport::default();
        }

        let message = PushMessage::for_notification(notification);
        let outcomes = join_all(tokens.iter().map(|token| self.attempt(token, &message))).await;
        let report = FanoutReport::from_outcomes(&outcomes);

        info!(
            user_id,
            sender = self.sender.name(),
            attempted = report.attempted,
            delivered = report.delivered,
            "Push fan-out finished"
        );
        report
    }

    async fn attempt(&self, token: &str, message: &PushMessage) -> DeliveryOutcome {
        // ---
        let result = match tokio::time::timeout(self.timeout, self.sender.send(token, message)).await
        {
            Ok(result) => result,
            Err(_) => Err(PushError::Timeout(self.timeout)),
        };

        // TODO: prune tokens that come back as InvalidToken once the users
        // collection has a write path in this service.
        if let Err(e) = &result {
            warn!(token = %mask_token(token), "Push delivery failed: {}", e);
        }

        DeliveryOutcome {
            token: token.to_string(),
            result,
        }
    }
}

/// Keep enough of a token to correlate logs without leaking it.
pub fn mask_token(token: &str) -> String {
    // ---
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() == token.len() {
        prefix
    } else {
        format!("{}…", prefix)
    }
}


#[cfg(test)]
mod tests {
    // ---
    use super::testing::RecordingSender;
    use super::*;
    use crate::models::NewNotification;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    fn notification() -> Notification {
        NewNotification {
            user_id: "U1".to_string(),
            pond_id: "kolam1".to_string(),
            title: "Peringatan Bahaya: Suhu Air".to_string(),
            message: "Status Bahaya di Kolam 1. Nilai tercatat: 35 °C.".to_string(),
            created_at: Utc::now(),
            recommendation_id: String::new(),
        }
        .into_notification()
    }

    #[test]
    fn test_payload_shape() {
        // ---
        let msg = PushMessage::for_notification(&notification());
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["notification"]["title"], "Peringatan Bahaya: Suhu Air");
        assert_eq!(
            json["notification"]["body"],
            "Status Bahaya di Kolam 1. Nilai tercatat: 35 °C."
        );
        assert_eq!(json["data"]["url"], "/notifikasi");
        assert_eq!(json["data"]["type"], "sensor_alert");
    }

    #[tokio::test]
    async fn test_one_failing_token_does_not_block_others() {
        // ---
        let store = MemoryStore::default();
        store.put_user("U1", &["tok-a", "tok-b", "tok-c"]);
        let sender = Arc::new(RecordingSender::failing(&["tok-b"]));
        let fanout = PushFanout::new(sender.clone(), Duration::from_secs(5));

        let report = fanout.deliver(&store, "U1", &notification()).await;

        assert_eq!(sender.attempted_tokens(), vec!["tok-a", "tok-b", "tok-c"]);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].token, "tok-b");
    }

    #[tokio::test]
    async fn test_no_tokens_means_no_attempts() {
        // ---
        let store = MemoryStore::default();
        store.put_user("U1", &[]);
        let sender = Arc::new(RecordingSender::default());
        let fanout = PushFanout::new(sender.clone(), Duration::from_secs(5));

        let report = fanout.deliver(&store, "U1", &notification()).await;
        assert_eq!(report, FanoutReport::default());

        // Unknown user behaves the same
        let report = fanout.deliver(&store, "ghost", &notification()).await;
        assert_eq!(report.attempted, 0);
        assert!(sender.attempted_tokens().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_times_out() {
        // ---
        let store = MemoryStore::default();
        store.put_user("U1", &["fast", "stuck"]);
        let sender = Arc::new(RecordingSender {
            hanging: ["stuck".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let fanout = PushFanout::new(sender.clone(), Duration::from_secs(10));

        let report = fanout.deliver(&store, "U1", &notification()).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert!(report.failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_disabled_sender_reports_failures() {
        // ---
        let store = MemoryStore::default();
        store.put_user("U1", &["tok-a"]);
        let fanout = PushFanout::new(Arc::new(DisabledSender), Duration::from_secs(1));

        let report = fanout.deliver(&store, "U1", &notification()).await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failures[0].reason, "push delivery is not configured");
    }

    #[test]
    fn test_mask_token() {
        // ---
        assert_eq!(mask_token("short"), "short");
        assert_eq!(mask_token("dGhpcyBpcyBhIHRva2Vu"), "dGhpcyBp…");
    }
}
