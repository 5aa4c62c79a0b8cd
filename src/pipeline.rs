//! Ingest trigger: runs once per newly written sensor-reading document.
//!
//! The flow is classify → compose → resolve owner, then for each candidate
//! alert in turn: cooldown check → persist → push fan-out. Every dependency
//! (stores, push sender, clock, thresholds) is injected at construction so no
//! state survives between invocations except what the store holds.
//!
//! A candidate whose cooldown query or insert fails is recorded as failed and
//! the remaining candidates still run; the invocation then returns an error so
//! the event runtime redelivers it. Candidates that were stored are suppressed
//! by the cooldown guard on redelivery.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::composer::{compose, pond_label, Alert};
use crate::cooldown::CooldownGuard;
use crate::models::{SensorReading, Severity};
use crate::ownership::{Owner, OwnershipResolver};
use crate::persister::persist;
use crate::push::{FanoutReport, PushFanout, PushSender};
use crate::store::{NotificationStore, PondStore, UserStore};
use crate::thresholds::resolve_rules;

// ---

/// Pipeline settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cooldown: CooldownGuard,
    /// Recipient for ponds without an owner. `None` drops those alerts.
    pub default_owner: Option<String>,
    /// Upper bound on a single push delivery attempt.
    pub push_timeout: Duration,
}

/// Injected collaborators.
pub struct Dependencies {
    pub ponds: Arc<dyn PondStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub users: Arc<dyn UserStore>,
    pub push: Arc<dyn PushSender>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub pond_id: String,
    pub doc_id: String,
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Every recognised parameter was safe.
    NoAlert,
    /// Alerts were composed but nobody owns the pond.
    NoOwner { candidates: usize },
    Processed { owner: Owner, alerts: Vec<AlertReport> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub title: String,
    pub parameter_key: String,
    pub severity: Severity,
    pub outcome: AlertOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlertOutcome {
    Suppressed,
    Delivered {
        notification_id: Uuid,
        push: FanoutReport,
    },
    Failed { error: String },
}

pub struct AlertPipeline {
    ponds: Arc<dyn PondStore>,
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    cooldown: CooldownGuard,
    ownership: OwnershipResolver,
    fanout: PushFanout,
}

impl AlertPipeline {
    pub fn new(config: PipelineConfig, deps: Dependencies) -> Self {
        // ---
        info!(
            cooldown_minutes = config.cooldown.window().num_minutes(),
            push_backend = deps.push.name(),
            "Alert pipeline ready"
        );
        Self {
            ponds: deps.ponds,
            notifications: deps.notifications,
            users: deps.users,
            clock: deps.clock,
            cooldown: config.cooldown,
            ownership: OwnershipResolver::new(config.default_owner),
            fanout: PushFanout::new(deps.push, config.push_timeout),
        }
    }

    /// Evaluate one reading and raise whatever alerts it warrants.
    #[tracing::instrument(skip_all, fields(pond_id = %reading.pond_id, doc_id = %reading.doc_id))]
    pub async fn handle(&self, reading: &SensorReading) -> Result<IngestReport> {
        // ---
        info!("Analysing incoming reading");

        let pond = self.ponds.get_pond(&reading.pond_id).await?;
        let rules = resolve_rules(pond.as_ref());
        debug!(rules = rules.rules().len(), "Threshold rules resolved");
        let results = rules.classify(reading);
        let label = pond_label(&reading.pond_id, pond.as_ref());
        let alerts = compose(&reading.pond_id, &label, &results);

        let report = |outcome| IngestReport {
            pond_id: reading.pond_id.clone(),
            doc_id: reading.doc_id.clone(),
            outcome,
        };

        if alerts.is_empty() {
            info!(checked = results.len(), "Reading within safe bands, no alert");
            return Ok(report(IngestOutcome::NoAlert));
        }

        let Some(owner) = self.ownership.resolve(&reading.pond_id, pond.as_ref()) else {
            warn!(
                candidates = alerts.len(),
                "Pond has no userId, alerts dropped"
            );
            return Ok(report(IngestOutcome::NoOwner {
                candidates: alerts.len(),
            }));
        };

        info!(
            user_id = %owner.user_id,
            candidates = alerts.len(),
            "Anomalies found"
        );

        let mut reports = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            let outcome = self.process_alert(&owner.user_id, alert).await;
            reports.push(AlertReport {
                title: alert.title.clone(),
                parameter_key: alert.parameter_key.clone(),
                severity: alert.severity,
                outcome,
            });
        }

        let failed = reports
            .iter()
            .filter(|r| matches!(r.outcome, AlertOutcome::Failed { .. }))
            .count();
        if failed > 0 {
            return Err(anyhow!(
                "{} of {} alerts for pond '{}' could not be stored",
                failed,
                reports.len(),
                reading.pond_id
            ));
        }

        Ok(report(IngestOutcome::Processed {
            owner,
            alerts: reports,
        }))
    }

    async fn process_alert(&self, owner: &str, alert: &Alert) -> AlertOutcome {
        // ---
        let now = self.clock.now();

        let active = self
            .cooldown
            .is_active(
                self.notifications.as_ref(),
                owner,
                &alert.pond_id,
                &alert.title,
                now,
            )
            .await;

        match active {
            Ok(true) => {
                debug!(title = %alert.title, "Alert held back, cooldown active");
                return AlertOutcome::Suppressed;
            }
            Ok(false) => {}
            Err(e) => {
                error!(title = %alert.title, "Cooldown check failed: {:#}", e);
                return AlertOutcome::Failed {
                    error: format!("{:#}", e),
                };
            }
        }

        let notification = match persist(self.notifications.as_ref(), owner, alert, now).await {
            Ok(notification) => notification,
            Err(e) => {
                error!(title = %alert.title, "Failed to store notification: {:#}", e);
                return AlertOutcome::Failed {
                    error: format!("{:#}", e),
                };
            }
        };

        let push = self
            .fanout
            .deliver(self.users.as_ref(), owner, &notification)
            .await;

        AlertOutcome::Delivered {
            notification_id: notification.id,
            push,
        }
    }
}
