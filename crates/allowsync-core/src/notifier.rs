//! Best-effort status notifications
//!
//! The [`Notifier`] turns a [`NotificationEvent`] into message text, adds the
//! configured identifier and hands it to whichever transport the target URL's
//! scheme selects. Callers use [`Notifier::notify_best_effort`], which logs
//! failures and never lets them change control flow.

use crate::config::{NotificationConfig, SyncConfig};
use crate::error::Result;
use crate::registry::TransportRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Severity of a notification, which picks its leading emoji
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A tick failed
    Error,
    /// The access group was initialised
    Success,
    /// The access group address changed
    Changed,
    /// Process started (test notification)
    Startup,
    /// Process is stopping
    Shutdown,
}

impl NotificationKind {
    /// Leading emoji for this severity
    pub fn emoji(self) -> &'static str {
        match self {
            NotificationKind::Error => "❌",
            NotificationKind::Success => "✅",
            NotificationKind::Changed => "🔄",
            NotificationKind::Startup => "🚀",
            NotificationKind::Shutdown => "⏹️",
        }
    }
}

/// A status message constructed per outcome and consumed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Severity
    pub kind: NotificationKind,
    /// Message body without the emoji
    pub text: String,
}

impl NotificationEvent {
    /// Create an event
    pub fn new(kind: NotificationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn resolve_failed(error: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::Error,
            format!("Error getting current IP: {}", error),
        )
    }

    pub fn fetch_failed(error: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::Error,
            format!("Error getting Cloudflare Access Group: {}", error),
        )
    }

    pub fn create_failed(error: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::Error,
            format!("Error updating Cloudflare Access Group: {}", error),
        )
    }

    pub fn update_failed(previous: &str, address: &str, error: impl fmt::Display) -> Self {
        Self::new(
            NotificationKind::Error,
            format!(
                "Failed to update IP from {} to {}: {}",
                previous, address, error
            ),
        )
    }

    pub fn created(address: &str) -> Self {
        Self::new(
            NotificationKind::Success,
            format!("Initial IP set in Cloudflare Access Group: {}", address),
        )
    }

    pub fn updated(previous: &str, address: &str) -> Self {
        Self::new(
            NotificationKind::Changed,
            format!("IP address changed from {} to {}", previous, address),
        )
    }

    pub fn startup_test() -> Self {
        Self::new(
            NotificationKind::Startup,
            "Cloudflare IP Updater started - Test notification",
        )
    }

    pub fn shutdown() -> Self {
        Self::new(NotificationKind::Shutdown, "Cloudflare IP Updater stopped")
    }

    /// Message text with its severity emoji
    pub fn render(&self) -> String {
        format!("{} {}", self.kind.emoji(), self.text)
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Dispatches notification events to the configured target
#[derive(Clone)]
pub struct Notifier {
    target: Option<NotificationConfig>,
    registry: Arc<TransportRegistry>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Target URLs routinely embed tokens
        f.debug_struct("Notifier")
            .field("enabled", &self.is_enabled())
            .field(
                "identifier",
                &self.target.as_ref().and_then(|t| t.identifier.as_deref()),
            )
            .finish()
    }
}

impl Notifier {
    /// Create a notifier for an optional target
    pub fn new(target: Option<NotificationConfig>, registry: Arc<TransportRegistry>) -> Self {
        Self { target, registry }
    }

    /// Create a notifier from the process configuration
    pub fn from_config(config: &SyncConfig, registry: Arc<TransportRegistry>) -> Self {
        Self::new(config.notification.clone(), registry)
    }

    /// A notifier with no target; every call is a successful no-op
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(TransportRegistry::new()))
    }

    /// Whether a target is configured
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Final message text as dispatched, including the identifier prefix
    pub fn format_message(&self, event: &NotificationEvent) -> String {
        let rendered = event.render();
        match self.target.as_ref().and_then(|t| t.identifier.as_deref()) {
            Some(identifier) => format!("{}: {}", identifier, rendered),
            None => rendered,
        }
    }

    /// Send a notification
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Delivered, or no target configured
    /// - `Err(Error::Notification)`: No transport for the URL, or delivery failed
    pub async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let Some(ref target) = self.target else {
            debug!("Notification URL not configured, skipping notification");
            return Ok(());
        };

        info!("Sending notification: {}", event);

        let transport = self.registry.transport_for(&target.url)?;
        let message = self.format_message(event);
        transport.send(&target.url, &message).await?;

        info!(
            "Notification sent successfully via {}",
            transport.transport_name()
        );
        Ok(())
    }

    /// Send a notification, logging and swallowing any failure
    ///
    /// Returns whether delivery succeeded (a disabled notifier counts as success).
    pub async fn notify_best_effort(&self, event: &NotificationEvent) -> bool {
        match self.notify(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send notification: {}", e);
                false
            }
        }
    }
}
