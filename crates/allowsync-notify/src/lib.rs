// # Webhook Notification Transports
//
// This crate delivers allowsync status messages to chat and webhook
// services. The target is a single URL whose scheme picks the service:
//
// - `generic://host/path`: POST `https://host/path` with `{"message": …}`
// - `generic+http://…`, `generic+https://…`: same, explicit scheme
// - `http://…`, `https://…`: POST to the URL as-is with `{"message": …}`
// - `discord://<token>@<webhook-id>`: POST `{"content": …}` to
//   `https://discord.com/api/webhooks/<id>/<token>`
// - `telegram://<bot-token>@telegram?chats=<a>,<b>`: POST once per chat to
//   `https://api.telegram.org/bot<token>/sendMessage`
//
// Each request has a bounded timeout. A non-2xx answer is an error; the
// caller decides whether that matters (allowsync treats it as best-effort).

use allowsync_core::{Error, NotificationTransport, Result, TransportRegistry};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Timeout for a single webhook request
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

const DISCORD_API_BASE: &str = "https://discord.com/api/webhooks";
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Schemes served by the generic webhook transport
pub const GENERIC_SCHEMES: &[&str] = &[
    "generic",
    "generic+http",
    "generic+https",
    "http",
    "https",
];

/// Webhook flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    /// Plain JSON POST
    Generic,
    /// Discord channel webhook
    Discord,
    /// Telegram bot API
    Telegram,
}

/// One HTTP request derived from a target URL and a message
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Where to POST
    pub endpoint: String,
    /// JSON body
    pub body: Value,
}

impl WebhookKind {
    /// Translate a target URL into the requests that deliver `message`
    pub fn plan(self, target: &str, message: &str) -> Result<Vec<Dispatch>> {
        let url = Url::parse(target)
            .map_err(|e| Error::notification(format!("invalid notification URL: {}", e)))?;

        match self {
            WebhookKind::Generic => plan_generic(target, &url, message),
            WebhookKind::Discord => plan_discord(&url, message),
            WebhookKind::Telegram => plan_telegram(&url, message),
        }
    }

    fn name(self) -> &'static str {
        match self {
            WebhookKind::Generic => "generic",
            WebhookKind::Discord => "discord",
            WebhookKind::Telegram => "telegram",
        }
    }
}

fn plan_generic(target: &str, url: &Url, message: &str) -> Result<Vec<Dispatch>> {
    let scheme = match url.scheme() {
        "generic" | "generic+https" | "https" => "https",
        "generic+http" | "http" => "http",
        other => {
            return Err(Error::notification(format!(
                "generic transport cannot handle scheme '{}'",
                other
            )));
        }
    };

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::notification("generic webhook URL has no host"));
    }

    // Keep authority, path and query exactly as written
    let rest = target
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| Error::notification("generic webhook URL has no authority"))?;

    Ok(vec![Dispatch {
        endpoint: format!("{}://{}", scheme, rest),
        body: json!({ "message": message }),
    }])
}

fn plan_discord(url: &Url, message: &str) -> Result<Vec<Dispatch>> {
    let token = url.username();
    let webhook_id = url.host_str().unwrap_or_default();

    if token.is_empty() || webhook_id.is_empty() {
        return Err(Error::notification(
            "discord URL must look like discord://<token>@<webhook-id>",
        ));
    }

    Ok(vec![Dispatch {
        endpoint: format!("{}/{}/{}", DISCORD_API_BASE, webhook_id, token),
        body: json!({ "content": message }),
    }])
}

fn plan_telegram(url: &Url, message: &str) -> Result<Vec<Dispatch>> {
    // Bot tokens contain a ':' so they arrive split into user and password
    let token = match url.password() {
        Some(secret) => format!("{}:{}", url.username(), secret),
        None => url.username().to_string(),
    };
    if url.username().is_empty() {
        return Err(Error::notification(
            "telegram URL must look like telegram://<bot-token>@telegram?chats=<chat>",
        ));
    }

    let chats: Vec<String> = url
        .query_pairs()
        .filter(|(key, _)| key == "chats")
        .flat_map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|chat| !chat.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    if chats.is_empty() {
        return Err(Error::notification("telegram URL has no chats"));
    }

    let endpoint = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, token);
    Ok(chats
        .into_iter()
        .map(|chat| Dispatch {
            endpoint: endpoint.clone(),
            body: json!({ "chat_id": chat, "text": message }),
        })
        .collect())
}

/// A webhook-based notification transport
pub struct WebhookTransport {
    kind: WebhookKind,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookTransport")
            .field("kind", &self.kind)
            .finish()
    }
}

impl WebhookTransport {
    /// Create a transport with its own HTTP client
    pub fn new(kind: WebhookKind) -> Result<Self> {
        Ok(Self::with_client(kind, build_client(DEFAULT_SEND_TIMEOUT)?))
    }

    /// Create a transport sharing an existing HTTP client
    pub fn with_client(kind: WebhookKind, client: reqwest::Client) -> Self {
        Self { kind, client }
    }

    async fn post(&self, dispatch: &Dispatch) -> Result<()> {
        let response = self
            .client
            .post(&dispatch.endpoint)
            .json(&dispatch.body)
            .send()
            .await
            // reqwest errors include the URL, which may carry a token
            .map_err(|e| Error::notification(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::notification(format!(
                "{} webhook returned {}: {}",
                self.kind.name(),
                status,
                body.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    async fn send(&self, url: &str, message: &str) -> Result<()> {
        let dispatches = self.kind.plan(url, message)?;

        for dispatch in &dispatches {
            self.post(dispatch).await?;
        }

        tracing::debug!(
            "Delivered {} {} request(s)",
            dispatches.len(),
            self.kind.name()
        );
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        self.kind.name()
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Register the built-in transports with a registry
///
/// # Example
///
/// ```rust,no_run
/// use allowsync_core::TransportRegistry;
///
/// let registry = TransportRegistry::new();
/// allowsync_notify::register(&registry).expect("HTTP client builds");
/// assert!(registry.has_transport("discord"));
/// ```
pub fn register(registry: &TransportRegistry) -> Result<()> {
    let client = build_client(DEFAULT_SEND_TIMEOUT)?;

    let generic: Arc<dyn NotificationTransport> =
        Arc::new(WebhookTransport::with_client(WebhookKind::Generic, client.clone()));
    for scheme in GENERIC_SCHEMES {
        registry.register_transport(*scheme, generic.clone());
    }

    registry.register_transport(
        "discord",
        Arc::new(WebhookTransport::with_client(WebhookKind::Discord, client.clone())),
    );
    registry.register_transport(
        "telegram",
        Arc::new(WebhookTransport::with_client(WebhookKind::Telegram, client)),
    );

    Ok(())
}
