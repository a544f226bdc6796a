// # Cloudflare Access Group Policy Store
//
// This crate reads and overwrites a Cloudflare Zero Trust Access Group, the
// remote allow-list record that allowsync keeps in sync.
//
// ## Behaviour
//
// - ✅ One HTTP request per call (GET to read, PUT to replace)
// - ✅ Full error propagation to the reconciler
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status-specific error messages (401/403, 404, 409, 429, 5xx)
// - ❌ NO retry logic (the next scheduled tick is the retry)
// - ❌ NO caching (the remote record is the only source of truth)
// - ❌ NO partial updates: PUT replaces the whole include list
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Store MUST fail fast if token is empty
//
// ## API Reference
//
// - Get Access Group: GET `/accounts/:account_id/access/groups/:group_id`
// - Update Access Group: PUT `/accounts/:account_id/access/groups/:group_id`

use allowsync_core::traits::{PolicyRecord, PolicyStore, ReplaceRequest};
use allowsync_core::{Error, Result, SyncConfig};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare API v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<PolicyRecord>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
}

/// Which call a status code belongs to
#[derive(Debug, Clone, Copy)]
enum Operation {
    Fetch,
    Replace,
}

impl Operation {
    fn error(self, message: String) -> Error {
        match self {
            Operation::Fetch => Error::policy_fetch(message),
            Operation::Replace => Error::policy_update(message),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Operation::Fetch => "get",
            Operation::Replace => "update",
        }
    }
}

/// Describe a non-success response; always keeps the status and body
fn status_error(operation: Operation, status: reqwest::StatusCode, body: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid API token or insufficient permissions: {}, status: {}",
            body, status
        ),
        404 => format!("Access group not found: {}, status: {}", body, status),
        409 => format!(
            "Conflict: access group is being modified elsewhere: {}, status: {}",
            body, status
        ),
        429 => format!("Rate limit exceeded: {}, status: {}", body, status),
        500..=599 => format!("Cloudflare server error (transient): {}, status: {}", body, status),
        _ => format!(
            "failed to {} Cloudflare group: {}, status: {}",
            operation.verb(),
            body,
            status
        ),
    };
    operation.error(message)
}

/// Cloudflare Access Group store
///
/// # Trust Level: Untrusted
///
/// This store is isolated, stateless and single-shot. Whether a write is
/// needed is decided by `Reconciler`.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflarePolicyStore {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Account owning the access group
    account_id: String,

    /// Access group identifier
    group_id: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflarePolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflarePolicyStore")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("group_id", &self.group_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflarePolicyStore {
    /// Create a new store against the production API
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Access: Groups edit permission
    /// - `account_id`: Account identifier
    /// - `group_id`: Access group (rule) identifier
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: A value is empty or the HTTP client cannot be built
    pub fn new(
        api_token: impl Into<String>,
        account_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let account_id = account_id.into();
        let group_id = group_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if account_id.is_empty() || group_id.is_empty() {
            return Err(Error::config("Cloudflare account and group IDs are required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            account_id,
            group_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Create a store from the process configuration
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(
            config.auth_token.clone(),
            config.account_id.clone(),
            config.rule_id.clone(),
        )
    }

    /// Point the store at a different API base (trailing `/` ignored)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the access group resource
    pub fn group_url(&self) -> String {
        format!(
            "{}/accounts/{}/access/groups/{}",
            self.base_url, self.account_id, self.group_id
        )
    }

    /// Read the body of a failed response and turn it into an error
    async fn reject(operation: Operation, response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        status_error(operation, status, &body)
    }
}

#[async_trait]
impl PolicyStore for CloudflarePolicyStore {
    /// Read the access group
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /accounts/:account_id/access/groups/:group_id
    /// Authorization: Bearer <token>
    /// ```
    async fn fetch_policy(&self) -> Result<PolicyRecord> {
        let url = self.group_url();
        tracing::debug!("Fetching access group {}", self.group_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::policy_fetch(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::reject(Operation::Fetch, response).await);
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| Error::policy_fetch(format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            tracing::warn!(
                "Cloudflare reported success=false for access group {}: {:?}",
                self.group_id,
                envelope.errors
            );
        }

        let record = envelope
            .result
            .ok_or_else(|| Error::policy_fetch("Invalid response format: result is missing"))?;

        tracing::debug!(
            "Access group {} has {} include entr(ies)",
            record.id,
            record.include.len()
        );
        Ok(record)
    }

    /// Replace the include list with a single `address/32` entry
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /accounts/:account_id/access/groups/:group_id
    /// Authorization: Bearer <token>
    ///
    /// {"include": [{"ip": {"ip": "198.51.100.1/32"}}]}
    /// ```
    async fn replace_policy(&self, address: &str) -> Result<()> {
        let url = self.group_url();
        let payload = ReplaceRequest::single_host(address);

        tracing::info!(
            "Updating access group {} include list to {}/32",
            self.group_id,
            address
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::policy_update(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::reject(Operation::Replace, response).await);
        }

        // Drain the body so the connection goes back to the pool
        let _ = response.bytes().await;

        tracing::info!("Access group {} updated successfully", self.group_id);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "cloudflare"
    }
}
