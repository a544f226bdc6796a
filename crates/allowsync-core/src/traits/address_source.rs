// # Address Source Trait
//
// Defines the interface for discovering the caller's current public address.
//
// ## Implementations
//
// - HTTP lookup chain: `allowsync-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use allowsync_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     let resolved = source.resolve_current().await?;
//     println!("{} (via {})", resolved.address, resolved.provider);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// A public address obtained from exactly one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// The address text, whitespace-trimmed
    pub address: String,
    /// The provider endpoint that answered
    pub provider: String,
    /// Providers that failed before this one answered, in query order
    pub skipped: Vec<ProviderFailure>,
}

impl ResolvedAddress {
    /// Create a resolved address with no recorded failures
    pub fn new(address: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            address: address.into().trim().to_string(),
            provider: provider.into(),
            skipped: Vec::new(),
        }
    }

    /// Attach the failures skipped on the way to this answer
    pub fn with_skipped(mut self, skipped: Vec<ProviderFailure>) -> Self {
        self.skipped = skipped;
        self
    }
}

/// One provider that did not produce a usable answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider endpoint
    pub provider: String,
    /// What went wrong
    pub reason: String,
}

/// Trait for address source implementations
///
/// Implementations are stateless across calls: every call recomputes the
/// address from scratch. They must bound their own network waits so a hung
/// lookup service cannot stall the reconciliation indefinitely.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to lookup services
/// - ✅ Fall through an ordered list of services
///
/// ## Forbidden Capabilities
/// - ❌ Retry a single service (the next tick is the retry)
/// - ❌ Cache addresses between calls
/// - ❌ Touch the policy store or the notifier
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Resolve the current public address
    ///
    /// # Returns
    ///
    /// - `Ok(ResolvedAddress)`: The first plausible answer
    /// - `Err(Error::Resolution)`: Every provider failed; wraps the last failure
    async fn resolve_current(&self) -> Result<ResolvedAddress, crate::Error>;

    /// Name of this source (for logging)
    fn source_name(&self) -> &'static str;
}
