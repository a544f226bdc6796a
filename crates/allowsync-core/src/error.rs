//! Error types for the allowsync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for allowsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the allowsync system
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration value is absent or empty
    #[error("{0} environment variable is not set")]
    ConfigurationMissing(String),

    /// A configuration value is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every address provider failed
    #[error("all IP providers failed ({attempts} tried), last error: {last}")]
    Resolution {
        /// Number of providers queried
        attempts: usize,
        /// Description of the last failure encountered
        last: String,
    },

    /// Reading the remote policy record failed
    #[error("Policy fetch failed: {0}")]
    PolicyFetch(String),

    /// Replacing the remote policy record failed
    #[error("Policy update failed: {0}")]
    PolicyUpdate(String),

    /// Dispatching a notification failed
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// A single address provider failed
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider endpoint
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a missing-configuration error for the named variable
    pub fn missing(var: impl Into<String>) -> Self {
        Self::ConfigurationMissing(var.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolution error wrapping the last provider failure
    pub fn resolution(attempts: usize, last: impl Into<String>) -> Self {
        Self::Resolution {
            attempts,
            last: last.into(),
        }
    }

    /// Create a policy fetch error
    pub fn policy_fetch(msg: impl Into<String>) -> Self {
        Self::PolicyFetch(msg.into())
    }

    /// Create a policy update error
    pub fn policy_update(msg: impl Into<String>) -> Self {
        Self::PolicyUpdate(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error should abort the process at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMissing(_) | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
