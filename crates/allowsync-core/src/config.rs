//! Configuration types for the allowsync system
//!
//! Configuration is loaded once at process start and shared read-only by
//! every component. Values come from environment variables, but loading goes
//! through [`SyncConfig::from_lookup`] so tests can inject their own source.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Account that owns the access group
pub const ENV_ACCOUNT_ID: &str = "ACCOUNTID";
/// Access group (rule) identifier
pub const ENV_RULE_ID: &str = "RULEID";
/// Schedule expression
pub const ENV_CRON: &str = "CRON";
/// Bearer credential for the policy service
pub const ENV_AUTH_TOKEN: &str = "AUTH_TOKEN";
/// Notification target URL
pub const ENV_NOTIFICATION_URL: &str = "NOTIFICATION_URL";
/// Prefix prepended to every notification
pub const ENV_NOTIFICATION_IDENTIFIER: &str = "NOTIFICATION_IDENTIFIER";
/// Send a notification at startup when set to `true`
pub const ENV_TEST_NOTIFICATION: &str = "TEST_NOTIFICATION";
/// Port for the liveness endpoint
pub const ENV_HEALTH_PORT: &str = "HEALTH_PORT";

/// Default liveness endpoint port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Main allowsync configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Account identifier
    pub account_id: String,

    /// Access group (policy rule) identifier
    pub rule_id: String,

    /// Schedule expression (cron or descriptor)
    pub schedule: String,

    /// Bearer credential
    /// ⚠️ NEVER log this value
    pub auth_token: String,

    /// Optional notification target
    #[serde(default)]
    pub notification: Option<NotificationConfig>,

    /// Send a test notification at startup
    #[serde(default)]
    pub test_notification: bool,

    /// Liveness endpoint port
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

// Custom Debug implementation that hides the bearer credential
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("account_id", &self.account_id)
            .field("rule_id", &self.rule_id)
            .field("schedule", &self.schedule)
            .field("auth_token", &"<REDACTED>")
            .field("notification", &self.notification)
            .field("test_notification", &self.test_notification)
            .field("health_port", &self.health_port)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Empty values are treated the same as absent ones.
    ///
    /// # Returns
    ///
    /// - `Ok(SyncConfig)`: All required values present and valid
    /// - `Err(Error::ConfigurationMissing)`: A required value is absent
    /// - `Err(Error::Config)`: An optional value is malformed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| Error::missing(key));

        let account_id = require(ENV_ACCOUNT_ID)?;
        let rule_id = require(ENV_RULE_ID)?;
        let schedule = require(ENV_CRON)?;
        let auth_token = require(ENV_AUTH_TOKEN)?;

        let notification = get(ENV_NOTIFICATION_URL).map(|url| NotificationConfig {
            url,
            identifier: get(ENV_NOTIFICATION_IDENTIFIER),
        });

        let test_notification = lookup(ENV_TEST_NOTIFICATION).as_deref() == Some("true");

        let health_port = match get(ENV_HEALTH_PORT) {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_HEALTH_PORT,
        };

        let config = Self {
            account_id,
            rule_id,
            schedule,
            auth_token,
            notification,
            test_notification,
            health_port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            (ENV_ACCOUNT_ID, &self.account_id),
            (ENV_RULE_ID, &self.rule_id),
            (ENV_CRON, &self.schedule),
            (ENV_AUTH_TOKEN, &self.auth_token),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing(key));
            }
        }

        if self.health_port == 0 {
            return Err(Error::config("HEALTH_PORT must be between 1 and 65535"));
        }

        Ok(())
    }

    /// Whether a notification target is configured
    pub fn notifications_enabled(&self) -> bool {
        self.notification.is_some()
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::config(format!(
            "HEALTH_PORT must be between 1 and 65535. Got: {}",
            raw
        ))),
    }
}

fn default_health_port() -> u16 {
    DEFAULT_HEALTH_PORT
}

/// Notification target configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Transport URL (scheme selects the transport)
    pub url: String,

    /// Prefix prepended to every message
    #[serde(default)]
    pub identifier: Option<String>,
}
