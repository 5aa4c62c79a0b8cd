//! Firebase Cloud Messaging (HTTP v1) sender.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use super::{PushError, PushMessage, PushSender};

// ---

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl FcmSender {
    /// `base_url` is normally `https://fcm.googleapis.com`.
    pub fn new(base_url: &str, project_id: &str, access_token: String) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build FCM HTTP client")?;
        let endpoint = format!(
            "{}/v1/projects/{}/messages:send",
            base_url.trim_end_matches('/'),
            project_id
        );

        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushSender for FcmSender {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        // ---
        let body = json!({
            "message": {
                "token": token,
                "notification": message.notification,
                "data": message.data,
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND || text.contains("UNREGISTERED") {
            return Err(PushError::InvalidToken);
        }

        Err(PushError::Rejected {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    fn name(&self) -> &str {
        "fcm"
    }
}
