//! Plugin-based notification transport registry
//!
//! The registry maps URL schemes to notification transports, so the target
//! URL alone decides how a message is delivered and the notifier never
//! branches on transport kinds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use allowsync_core::registry::TransportRegistry;
//!
//! let registry = TransportRegistry::new();
//! allowsync_notify::register(&registry)?;
//!
//! let transport = registry.transport_for("discord://token@1234")?;
//! transport.send("discord://token@1234", "hello").await?;
//! ```
//!
//! ## Registration
//!
//! Transport crates register themselves during initialization:
//!
//! ```rust,ignore
//! pub fn register(registry: &TransportRegistry) -> Result<()> {
//!     let discord = WebhookTransport::new(WebhookKind::Discord)?;
//!     registry.register_transport("discord", Arc::new(discord));
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::traits::NotificationTransport;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of notification transports keyed by URL scheme
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct TransportRegistry {
    transports: RwLock<HashMap<String, Arc<dyn NotificationTransport>>>,
}

impl TransportRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for a URL scheme
    ///
    /// Schemes are matched case-insensitively. Registering a scheme twice
    /// replaces the earlier transport.
    pub fn register_transport(
        &self,
        scheme: impl Into<String>,
        transport: Arc<dyn NotificationTransport>,
    ) {
        let scheme = scheme.into().to_ascii_lowercase();
        let mut transports = self
            .transports
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        transports.insert(scheme, transport);
    }

    /// Look up the transport responsible for a target URL
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn NotificationTransport>)`: The registered transport
    /// - `Err(Error::Notification)`: The URL is malformed or its scheme is unknown
    pub fn transport_for(&self, target: &str) -> Result<Arc<dyn NotificationTransport>> {
        let scheme = url_scheme(target)?;
        let transports = self
            .transports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        transports.get(&scheme).cloned().ok_or_else(|| {
            Error::notification(format!("no transport registered for scheme '{}'", scheme))
        })
    }

    /// Check whether a scheme has a transport
    pub fn has_transport(&self, scheme: &str) -> bool {
        self.transports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&scheme.to_ascii_lowercase())
    }

    /// List registered schemes, sorted
    pub fn list_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .transports
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        schemes.sort();
        schemes
    }
}

fn url_scheme(target: &str) -> Result<String> {
    let parsed = url::Url::parse(target)
        .map_err(|e| Error::notification(format!("invalid notification URL: {}", e)))?;
    Ok(parsed.scheme().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl NotificationTransport for NullTransport {
        async fn send(&self, _url: &str, _message: &str) -> Result<()> {
            Ok(())
        }

        fn transport_name(&self) -> &'static str {
            "null"
        }
    }

    #[test]
    fn test_registry_lookup_by_scheme() {
        let registry = TransportRegistry::new();
        registry.register_transport("Generic", Arc::new(NullTransport));

        assert!(registry.has_transport("generic"));
        let transport = registry.transport_for("generic://hooks.example.net/x").unwrap();
        assert_eq!(transport.transport_name(), "null");
        assert_eq!(registry.list_schemes(), vec!["generic".to_string()]);
    }

    #[test]
    fn test_unknown_scheme() {
        let registry = TransportRegistry::new();
        let err = registry.transport_for("pigeon://coop").err().unwrap();
        assert!(err.to_string().contains("pigeon"));
    }

    #[test]
    fn test_malformed_url() {
        let registry = TransportRegistry::new();
        registry.register_transport("generic", Arc::new(NullTransport));
        assert!(registry.transport_for("no scheme here").is_err());
    }
}
