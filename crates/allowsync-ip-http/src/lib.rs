// # HTTP Address Source
//
// This crate discovers the caller's public IP address by querying external
// lookup services over HTTP.
//
// ## Fallback Chain
//
// Any single lookup service may be down or rate limiting, so the resolver
// walks an ordered table of providers and returns the first plausible
// answer:
//
// 1. Query the provider with a bounded timeout (5 seconds by default)
// 2. Transport error or non-2xx → record the failure, try the next provider
// 3. JSON providers: the configured field must be a non-empty string
// 4. Plain-text providers: the trimmed body must be non-empty and contain a `.`
// 5. All providers failed → `Error::Resolution` wrapping the last failure
//
// There is no retry within a provider and the order is never shuffled.
//
// ## Plausibility Check
//
// The plain-text check is a heuristic, not address validation. It rejects
// HTML error pages and empty bodies; it also rejects bare IPv6 answers.

use allowsync_core::traits::{AddressSource, ProviderFailure, ResolvedAddress};
use allowsync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;

/// Per-provider request timeout
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default provider table, in priority order: (url, JSON field or plain text)
const DEFAULT_PROVIDERS: &[(&str, Option<&str>)] = &[
    ("https://api.ipify.org?format=json", Some("ip")),
    ("https://api.my-ip.io/ip.json", Some("ip")),
    ("https://ifconfig.me/all.json", Some("ip_addr")),
    ("https://ipinfo.io/json", Some("ip")),
    ("https://api.myip.com", Some("ip")),
    ("https://ifconfig.co/json", Some("ip")),
    ("https://ip.seeip.org/jsonip", Some("ip")),
    ("https://icanhazip.com", None),
    ("https://ifconfig.me", None),
    ("https://ipecho.net/plain", None),
];

/// How a provider encodes its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseShape {
    /// The body is the address
    PlainText,
    /// The body is a JSON object; the address is a top-level string field
    Json {
        /// Field holding the address
        field: String,
    },
}

/// One lookup service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Query endpoint
    pub url: String,
    /// Response encoding
    pub shape: ResponseShape,
}

impl ProviderDescriptor {
    /// A provider answering with a JSON object
    pub fn json(url: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shape: ResponseShape::Json {
                field: field.into(),
            },
        }
    }

    /// A provider answering with the bare address
    pub fn plain_text(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shape: ResponseShape::PlainText,
        }
    }
}

/// The built-in provider table
pub fn default_providers() -> Vec<ProviderDescriptor> {
    DEFAULT_PROVIDERS
        .iter()
        .map(|(url, field)| match field {
            Some(field) => ProviderDescriptor::json(*url, *field),
            None => ProviderDescriptor::plain_text(*url),
        })
        .collect()
}

/// Why a single provider produced no answer
#[derive(Debug, ThisError)]
enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {status}, body: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode JSON: {0}")]
    Decode(String),

    #[error("could not find IP in JSON field '{0}'")]
    MissingField(String),

    #[error("received invalid IP: '{0}'")]
    Implausible(String),
}

/// Extract the address from a JSON body
fn extract_json_field(body: &serde_json::Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Sanity-check a plain-text body
fn plausible_plain_text(body: &str) -> Option<String> {
    let ip = body.trim();
    (!ip.is_empty() && ip.contains('.')).then(|| ip.to_string())
}

/// Address source walking an ordered provider table
pub struct HttpAddressResolver {
    providers: Vec<ProviderDescriptor>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAddressResolver")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl HttpAddressResolver {
    /// Create a resolver over `providers` with the default timeout
    pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
        Self::with_timeout(providers, DEFAULT_LOOKUP_TIMEOUT)
    }

    /// Create a resolver over the built-in provider table
    pub fn with_defaults() -> Result<Self> {
        Self::new(default_providers())
    }

    /// Create a resolver with a custom per-provider timeout
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: The table is empty or the HTTP client cannot be built
    pub fn with_timeout(providers: Vec<ProviderDescriptor>, timeout: Duration) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::config("address provider table is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { providers, client })
    }

    /// The provider table, in query order
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Query one provider
    ///
    /// The response body is always read to completion so the connection is
    /// released before the next provider is tried.
    async fn query(
        &self,
        provider: &ProviderDescriptor,
    ) -> std::result::Result<String, LookupError> {
        let response = self.client.get(&provider.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        match provider.shape {
            ResponseShape::Json { ref field } => {
                let body: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| LookupError::Decode(e.to_string()))?;
                extract_json_field(&body, field)
                    .ok_or_else(|| LookupError::MissingField(field.clone()))
            }
            ResponseShape::PlainText => {
                let body = response.text().await?;
                plausible_plain_text(&body)
                    .ok_or_else(|| LookupError::Implausible(body.trim().to_string()))
            }
        }
    }
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressResolver {
    async fn resolve_current(&self) -> Result<ResolvedAddress> {
        let mut skipped: Vec<ProviderFailure> = Vec::new();

        for provider in &self.providers {
            tracing::debug!("Trying to get IP from: {}", provider.url);

            match self.query(provider).await {
                Ok(address) => {
                    tracing::info!("Successfully obtained IP from {}", provider.url);
                    return Ok(
                        ResolvedAddress::new(address, provider.url.clone()).with_skipped(skipped)
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to get IP from {}: {}", provider.url, e);
                    skipped.push(ProviderFailure {
                        provider: provider.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let last = skipped
            .last()
            .map(|failure| Error::provider(&failure.provider, &failure.reason).to_string())
            .unwrap_or_else(|| "no providers configured".to_string());
        Err(Error::resolution(skipped.len(), last))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_table_order() {
        let providers = default_providers();

        assert_eq!(providers.len(), 10);
        assert_eq!(
            providers[0],
            ProviderDescriptor::json("https://api.ipify.org?format=json", "ip")
        );
        assert_eq!(
            providers[2].shape,
            ResponseShape::Json {
                field: "ip_addr".to_string()
            }
        );
        assert!(
            providers[7..]
                .iter()
                .all(|p| p.shape == ResponseShape::PlainText)
        );
    }

    #[test]
    fn test_extract_json_field() {
        assert_eq!(
            extract_json_field(&json!({"ip": "198.51.100.7"}), "ip"),
            Some("198.51.100.7".to_string())
        );
        assert_eq!(extract_json_field(&json!({"ip": ""}), "ip"), None);
        assert_eq!(extract_json_field(&json!({"ip": 42}), "ip"), None);
        assert_eq!(extract_json_field(&json!({"addr": "1.2.3.4"}), "ip"), None);
        assert_eq!(extract_json_field(&json!(["1.2.3.4"]), "ip"), None);
    }

    #[test]
    fn test_plain_text_plausibility() {
        assert_eq!(
            plausible_plain_text(" 198.51.100.7\n"),
            Some("198.51.100.7".to_string())
        );
        assert_eq!(plausible_plain_text("\n"), None);
        assert_eq!(plausible_plain_text("rate limited"), None);
        assert_eq!(plausible_plain_text("2001:db8::1"), None);
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(HttpAddressResolver::new(Vec::new()).is_err());
        assert!(HttpAddressResolver::with_defaults().is_ok());
    }

    #[test]
    fn test_descriptor_serde() {
        let descriptor: ProviderDescriptor = serde_json::from_value(json!({
            "url": "https://lookup.example.net/ip",
            "shape": {"type": "json", "field": "address"}
        }))
        .unwrap();
        assert_eq!(
            descriptor,
            ProviderDescriptor::json("https://lookup.example.net/ip", "address")
        );
    }
}
