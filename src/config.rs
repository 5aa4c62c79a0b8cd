//! Configuration loader for the `smikole-alerts` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::cooldown::CooldownGuard;
use crate::pipeline::PipelineConfig;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable; blank counts as unset.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
}

/// Credentials for Firebase Cloud Messaging.
#[derive(Clone)]
pub struct FcmConfig {
    // ---
    pub endpoint: String,
    pub project_id: String,
    pub access_token: String,
}

impl std::fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("access_token", &"****")
            .finish()
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// HTTP port the trigger receiver listens on.
    pub port: u16,

    /// Minimum minutes between two identical alerts for one owner and pond.
    pub cooldown_minutes: u32,

    /// Per-device push delivery timeout, in seconds.
    pub push_timeout_secs: u32,

    /// Recipient for ponds without an owner. Unset means such alerts are dropped.
    pub default_owner_id: Option<String>,

    /// Push delivery; `None` disables it.
    pub fcm: Option<FcmConfig>,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `PORT` – listen port (default: 8080)
/// - `COOLDOWN_MINUTES` – alert cooldown window (default: 60)
/// - `PUSH_TIMEOUT_SECS` – per-device push timeout (default: 10)
/// - `DEFAULT_OWNER_ID` – fallback alert recipient (default: none)
/// - `FCM_PROJECT_ID`, `FCM_ACCESS_TOKEN` – both required to enable push
/// - `FCM_ENDPOINT` – FCM base URL (default: `https://fcm.googleapis.com`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let port = u16::try_from(parse_env_u32!("PORT", 8080))
        .map_err(|_| anyhow!("Invalid PORT: out of range"))?;
    let cooldown_minutes = parse_env_u32!("COOLDOWN_MINUTES", 60);
    let push_timeout_secs = parse_env_u32!("PUSH_TIMEOUT_SECS", 10);
    let default_owner_id = optional_env!("DEFAULT_OWNER_ID");

    let fcm = match (optional_env!("FCM_PROJECT_ID"), optional_env!("FCM_ACCESS_TOKEN")) {
        (Some(project_id), Some(access_token)) => Some(FcmConfig {
            endpoint: optional_env!("FCM_ENDPOINT")
                .unwrap_or_else(|| "https://fcm.googleapis.com".to_string()),
            project_id,
            access_token,
        }),
        (None, None) => None,
        _ => {
            return Err(anyhow!(
                "FCM_PROJECT_ID and FCM_ACCESS_TOKEN must be set together"
            ))
        }
    };

    Ok(Config {
        db_url,
        db_pool_max,
        port,
        cooldown_minutes,
        push_timeout_secs,
        default_owner_id,
        fcm,
    })
}

impl Config {
    /// Pipeline settings derived from this configuration.
    pub fn pipeline(&self) -> PipelineConfig {
        // ---
        PipelineConfig {
            cooldown: CooldownGuard::from_minutes(self.cooldown_minutes),
            default_owner: self.default_owner_id.clone(),
            push_timeout: Duration::from_secs(u64::from(self.push_timeout_secs.max(1))),
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the FCM token
    /// while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL      : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX       : {}", self.db_pool_max);
        tracing::info!("  PORT              : {}", self.port);
        tracing::info!("  COOLDOWN_MINUTES  : {}", self.cooldown_minutes);
        tracing::info!("  PUSH_TIMEOUT_SECS : {}", self.push_timeout_secs);
        match &self.default_owner_id {
            Some(owner) => tracing::warn!("  DEFAULT_OWNER_ID  : {} (ownerless ponds alert this user)", owner),
            None => tracing::info!("  DEFAULT_OWNER_ID  : <unset>"),
        }
        match &self.fcm {
            Some(fcm) => {
                tracing::info!("  FCM_ENDPOINT      : {}", fcm.endpoint);
                tracing::info!("  FCM_PROJECT_ID    : {}", fcm.project_id);
                tracing::info!("  FCM_ACCESS_TOKEN  : ****");
            }
            None => tracing::warn!("  FCM               : <disabled> (push notifications off)"),
        }
    }
}

/// Mask the password in a database URL.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // `postgres://host@...` has its only colon in the scheme
            if db_url[..colon_pos].contains("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mask_db_url() {
        // ---
        assert_eq!(
            mask_db_url("postgres://smikole:hunter2@db:5432/smikole"),
            "postgres://smikole:****@db:5432/smikole"
        );
        assert_eq!(mask_db_url("postgres://db/smikole"), "postgres://db/smikole");
        assert_eq!(
            mask_db_url("postgres://smikole@db/smikole"),
            "postgres://smikole@db/smikole"
        );
    }

    #[test]
    fn test_pipeline_settings() {
        // ---
        let cfg = Config {
            db_url: "postgres://db/smikole".to_string(),
            db_pool_max: 5,
            port: 8080,
            cooldown_minutes: 30,
            push_timeout_secs: 0,
            default_owner_id: None,
            fcm: None,
        };

        let pipeline = cfg.pipeline();
        assert_eq!(pipeline.cooldown.window(), chrono::Duration::minutes(30));
        assert_eq!(pipeline.push_timeout, Duration::from_secs(1));
        assert!(pipeline.default_owner.is_none());
    }

    #[test]
    fn test_fcm_token_not_in_debug_output() {
        // ---
        let fcm = FcmConfig {
            endpoint: "https://fcm.googleapis.com".to_string(),
            project_id: "smikole".to_string(),
            access_token: "ya29.secret".to_string(),
        };
        let shown = format!("{:?}", fcm);
        assert!(shown.contains("smikole"));
        assert!(!shown.contains("ya29"));
    }
}
