// # Policy Store Trait
//
// Defines the interface for reading and overwriting the remote allow-list
// record (an access group keyed by account and rule identifiers).
//
// ## Implementations
//
// - Cloudflare Access Groups: `allowsync-provider-cloudflare` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix the policy service stores on single-host IPv4 entries
pub const HOST_PREFIX_SUFFIX: &str = "/32";

/// The remote allow-list record
///
/// Only `include` is interpreted. Everything else is passed through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Record identifier
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Entries currently permitted by the record
    #[serde(default)]
    pub include: Vec<IncludeRule>,

    /// Creation timestamp (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Last update timestamp (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// Remaining fields (uid, require, exclude, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyRecord {
    /// The address of the first include entry, if it is a non-empty IP rule
    pub fn current_address(&self) -> Option<&str> {
        self.include
            .first()
            .and_then(IncludeRule::ip_address)
            .filter(|ip| !ip.is_empty())
    }

    /// The first include address with a trailing `/32` removed
    pub fn current_host_address(&self) -> Option<&str> {
        self.current_address().map(strip_host_prefix)
    }
}

/// A single include entry
///
/// IP entries expose their address; any other rule kind (email, group,
/// ...) is preserved as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeRule {
    /// IP rule body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpRule>,

    /// Non-IP rule fields
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IncludeRule {
    /// Build a single-host IP entry (`address/32`)
    pub fn host(address: &str) -> Self {
        Self {
            ip: Some(IpRule {
                ip: format!("{}{}", address, HOST_PREFIX_SUFFIX),
            }),
            other: Map::new(),
        }
    }

    /// The IP text of this entry, if it is an IP rule
    pub fn ip_address(&self) -> Option<&str> {
        self.ip.as_ref().map(|rule| rule.ip.as_str())
    }
}

/// IP rule body: `{"ip": "a.b.c.d/32"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    /// Address with prefix length
    #[serde(default)]
    pub ip: String,
}

/// Full replacement payload for the include list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceRequest {
    /// The complete new include list
    pub include: Vec<IncludeRule>,
}

impl ReplaceRequest {
    /// Payload replacing the include list with exactly one host entry
    pub fn single_host(address: &str) -> Self {
        Self {
            include: vec![IncludeRule::host(address)],
        }
    }
}

/// Remove one trailing `/32` from an address
pub fn strip_host_prefix(address: &str) -> &str {
    address.strip_suffix(HOST_PREFIX_SUFFIX).unwrap_or(address)
}

/// Trait for policy store implementations
///
/// # Trust Level: Untrusted
///
/// Stores are isolated, stateless and single-shot: one HTTP request per
/// call, no retries, no caching. The reconciler decides whether a write is
/// needed.
///
/// # Overwrite Semantics
///
/// [`PolicyStore::replace_policy`] overwrites the whole include list. Any
/// entries added to the remote record out-of-band are lost on the next
/// change.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Read the current policy record
    ///
    /// # Returns
    ///
    /// - `Ok(PolicyRecord)`: The decoded record
    /// - `Err(Error::PolicyFetch)`: Transport failure, non-2xx or decode failure
    async fn fetch_policy(&self) -> Result<PolicyRecord, crate::Error>;

    /// Replace the include list with a single `address/32` entry
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The write was accepted
    /// - `Err(Error::PolicyUpdate)`: Transport failure or non-2xx
    async fn replace_policy(&self, address: &str) -> Result<(), crate::Error>;

    /// Name of the policy service (for logging)
    fn store_name(&self) -> &'static str;
}
