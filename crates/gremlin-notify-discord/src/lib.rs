// # Discord Notification Sink
//
// This crate provides a NotificationSink that posts messages to Discord
// channels through the REST API with a bot token.
//
// ## Behavior
//
// - One HTTP request per `send` call
// - Messages longer than Discord's 2000-character limit are truncated
// - Specific error mapping for HTTP status codes (401, 403, 404, 429, 5xx)
// - NO retry logic: delivery is best-effort and callers log failures
// - NO background tasks and NO queueing
//
// ## Trust Level: Untrusted (Sink)
//
// **Allowed Capabilities**:
// - Perform HTTPS calls to the Discord API only
// - Parse Discord error responses
//
// **Forbidden Capabilities**:
// - Spawn tasks or threads
// - Retry or buffer messages
// - Access the key-value store
//
// ## Security Requirements
//
// - Bot token NEVER appears in logs or `Debug` output
// - Bot token MUST be provided via environment variables only
// - Sink construction fails fast if the token is empty
//
// ## API Reference
//
// - Create Message: POST `/channels/{channel.id}/messages`
// - Authorization header: `Bot <token>`

use async_trait::async_trait;
use gremlin_core::config::SinkConfig;
use gremlin_core::traits::{NotificationSink, NotificationSinkFactory};
use gremlin_core::{Error, PluginRegistry, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Discord API base URL
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest message Discord accepts
pub const MESSAGE_LIMIT: usize = 2000;

const TRUNCATION_MARKER: &str = "…";

/// Body of a 429 response
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Cut `text` down to [`MESSAGE_LIMIT`] characters
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let keep = MESSAGE_LIMIT - TRUNCATION_MARKER.chars().count();
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// Map a failed response to an error
///
/// `body` is only used for 429 (to report `retry_after`) and for the message
/// of generic failures.
pub fn classify_failure(status: u16, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Discord rejected the bot token or the bot lacks access to the channel. Status: {}",
            status
        )),
        404 => Error::notify(format!("Unknown Discord channel. Status: {}", status)),
        429 => {
            let retry_after = serde_json::from_str::<RateLimitBody>(body)
                .ok()
                .and_then(|b| b.retry_after);
            Error::rate_limited(match retry_after {
                Some(secs) => format!("Discord rate limit hit, retry after {:.1}s", secs),
                None => "Discord rate limit hit".to_string(),
            })
        }
        500..=599 => Error::notify(format!("Discord server error (transient): {}", status)),
        _ => Error::notify(format!("Discord rejected the message: {} - {}", status, body)),
    }
}

/// Discord REST notification sink
///
/// # Trust Level: Untrusted
///
/// Isolated, stateless and single-shot. The poller and the tail forwarder
/// decide what to do with a failure (log it and move on).
pub struct DiscordSink {
    /// Bot token
    /// ⚠️ NEVER log this value
    bot_token: String,

    /// API base URL
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bot token
impl std::fmt::Debug for DiscordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSink")
            .field("bot_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DiscordSink {
    /// Create a new Discord sink
    ///
    /// # Returns
    ///
    /// - `Ok(DiscordSink)`: Ready to send
    /// - `Err(Error::Config)`: Empty token or HTTP client construction failed
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(bot_token, DISCORD_API_BASE)
    }

    /// Create a sink against a different API base (proxies, tests)
    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.is_empty() {
            return Err(Error::config("Discord bot token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn message_url(&self, channel: &str) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel)
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    /// Post `text` to a channel
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /channels/{channel}/messages
    /// Authorization: Bot <token>
    ///
    /// { "content": "..." }
    /// ```
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a Discord channel id",
                channel
            )));
        }

        let response = self
            .client
            .post(self.message_url(channel))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&serde_json::json!({ "content": truncate_message(text) }))
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        tracing::debug!("Posted {} chars to channel {}", text.chars().count(), channel);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "discord"
    }
}

/// Factory for creating Discord sinks
pub struct DiscordSinkFactory;

impl NotificationSinkFactory for DiscordSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Arc<dyn NotificationSink>> {
        match config {
            SinkConfig::Discord { bot_token } => Ok(Arc::new(DiscordSink::new(bot_token.clone())?)),
            _ => Err(Error::config("Invalid config for Discord sink")),
        }
    }
}

/// Register the Discord sink with a registry
///
/// # Example
///
/// ```rust
/// use gremlin_core::PluginRegistry;
///
/// let registry = PluginRegistry::with_defaults();
/// gremlin_notify_discord::register(&registry);
/// assert!(registry.has_sink("discord"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_sink("discord", Box::new(DiscordSinkFactory));
}
