//! Data models shared by the alert pipeline, the stores and the routes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---

/// One newly written sensor-reading document, as delivered by the event runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    // ---
    pub pond_id: String,
    pub doc_id: String,
    /// Flat parameter-key to value mapping (`suhu`, `pH`, `DO`, heater flags...).
    #[serde(rename = "data")]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Coerce a raw document value into a number.
///
/// Numbers pass through, strings are parsed as decimals. Booleans, nulls,
/// unparsable strings and non-finite results count as missing.
pub fn as_number(value: &Value) -> Option<f64> {
    // ---
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Severity tier of a classified value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Safe,
    Caution,
    Danger,
}

impl Severity {
    /// Label used in titles and messages shown to pond owners.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Safe => "Aman",
            Severity::Caution => "Waspada",
            Severity::Danger => "Bahaya",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, Severity::Safe)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted in-app notification.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    // ---
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "kolamId")]
    #[sqlx(rename = "kolam_id")]
    pub pond_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub recommendation_id: String,
}

/// Notification as handed to a store for insertion.
#[derive(Debug, Clone)]
pub struct NewNotification {
    // ---
    pub user_id: String,
    pub pond_id: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub recommendation_id: String,
}

impl NewNotification {
    /// Materialize the record under a freshly generated id, unread and not deleted.
    pub fn into_notification(self) -> Notification {
        // ---
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            pond_id: self.pond_id,
            title: self.title,
            message: self.message,
            read: false,
            deleted: false,
            created_at: self.created_at,
            recommendation_id: self.recommendation_id,
        }
    }
}

/// Pond document. Only `user_id` and `sensors` matter to alerting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pond {
    // ---
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[sqlx(json)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    #[sqlx(json)]
    pub actuators: Vec<ActuatorConfig>,
}

/// Admin-configured sensor with its safe (`aman`) and caution (`waspada`) bounds.
///
/// Bounds come from a free-form admin form, so they may arrive as numbers,
/// numeric strings or empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfig {
    // ---
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub aman_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub aman_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wasp_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wasp_max: Option<f64>,
}

impl SensorConfig {
    /// Heater and other actuator entries occasionally land in the sensor list.
    pub fn is_actuator(&self) -> bool {
        matches!(self.kind.as_str(), "heater" | "actuator")
    }

    pub fn has_bounds(&self) -> bool {
        self.aman_min.is_some()
            || self.aman_max.is_some()
            || self.wasp_min.is_some()
            || self.wasp_max.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorConfig {
    // ---
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// User profile holding push-delivery endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    // ---
    pub id: String,
    #[serde(default)]
    pub fcm_tokens: Vec<String>,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_number))
}
