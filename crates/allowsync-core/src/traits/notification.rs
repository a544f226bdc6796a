// # Notification Transport Trait
//
// Defines the single-method capability used to deliver a status message to
// an external channel addressed by URL.
//
// ## Implementations
//
// - Webhook family (generic, discord, telegram): `allowsync-notify` crate

use async_trait::async_trait;

/// Trait for notification transport implementations
///
/// A transport is selected by the scheme of the target URL (see
/// [`crate::registry::TransportRegistry`]) and receives the full URL so it
/// can extract credentials and endpoints from it.
///
/// # Trust Level: Untrusted
///
/// Transports may perform outbound calls with a bounded timeout and must
/// report failures as errors. Callers treat every failure as best-effort.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver `message` to the channel addressed by `url`
    async fn send(&self, url: &str, message: &str) -> Result<(), crate::Error>;

    /// Name of this transport (for logging)
    fn transport_name(&self) -> &'static str;
}
