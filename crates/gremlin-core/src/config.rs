//! Configuration types for the gremlin system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main gremlin configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GremlinConfig {
    /// Key-value store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Notification sink backend
    #[serde(default)]
    pub sink: SinkConfig,

    /// Store namespaces
    #[serde(default)]
    pub paths: StorePaths,

    /// Login-log tail forwarding
    #[serde(default)]
    pub tail: TailConfig,

    /// Tracked feeds
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    /// Command front end settings
    #[serde(default)]
    pub commands: CommandConfig,
}

impl GremlinConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.sink.validate()?;
        self.paths.validate()?;
        self.tail.validate()?;
        self.commands.validate()?;

        let mut seen = std::collections::HashSet::new();
        for feed in &self.feeds {
            feed.validate()?;
            if !seen.insert(feed.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Feed '{}' is configured more than once",
                    feed.name
                )));
            }
        }

        Ok(())
    }
}

/// Key-value store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store (not persistent, single process)
    #[default]
    Memory,

    /// REST realtime-database store
    Rtdb {
        /// Database root URL (e.g., "https://example.firebaseio.com")
        database_url: String,
        /// Optional auth token appended to every request
        auth_token: Option<String>,
        /// Tail subscription poll interval in milliseconds
        #[serde(default = "default_tail_poll_interval_ms")]
        tail_poll_interval_ms: u64,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Rtdb {
                database_url,
                tail_poll_interval_ms,
                ..
            } => {
                if database_url.is_empty() {
                    return Err(crate::Error::config("Store database URL cannot be empty"));
                }
                if !database_url.starts_with("https://") && !database_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Store database URL must use HTTP or HTTPS scheme. Got: {}",
                        database_url
                    )));
                }
                if *tail_poll_interval_ms == 0 {
                    return Err(crate::Error::config("Tail poll interval must be > 0"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::Rtdb { .. } => "rtdb",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_tail_poll_interval_ms() -> u64 {
    2000
}

/// Notification sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Log notifications instead of sending them
    #[default]
    Log,

    /// Discord bot (REST API)
    Discord {
        /// Bot token
        bot_token: String,
    },

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SinkConfig {
    /// Validate the sink configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Log => Ok(()),
            SinkConfig::Discord { bot_token } => {
                if bot_token.is_empty() {
                    return Err(crate::Error::config("Discord bot token cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom sink factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::Log => "log",
            SinkConfig::Discord { .. } => "discord",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Store namespaces used by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorePaths {
    /// Address bans, keyed by canonical key
    pub address_bans: String,
    /// Device bans, keyed by device token
    pub device_bans: String,
    /// Append-only login log collection
    pub login_logs: String,
    /// Per-feed poll state root (`<root>/<feed>/lastSeenId`)
    pub notifications: String,
    /// Giveaway entries, keyed by actor id
    pub giveaway_entries: String,
    /// Online user presence collection
    pub online_users: String,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self {
            address_bans: "bans/address".to_string(),
            device_bans: "bans/device".to_string(),
            login_logs: "loginLogs".to_string(),
            notifications: "notifications".to_string(),
            giveaway_entries: "giveaway/entries".to_string(),
            online_users: "online_users".to_string(),
        }
    }
}

impl StorePaths {
    /// Validate that every namespace is a usable store path
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, path) in [
            ("address_bans", &self.address_bans),
            ("device_bans", &self.device_bans),
            ("login_logs", &self.login_logs),
            ("notifications", &self.notifications),
            ("giveaway_entries", &self.giveaway_entries),
            ("online_users", &self.online_users),
        ] {
            if path.trim_matches('/').is_empty() {
                return Err(crate::Error::config(format!("Store path {} cannot be empty", name)));
            }
            if path.contains(['.', '#', '$', '[', ']']) {
                return Err(crate::Error::config(format!(
                    "Store path {} contains a reserved character: {}",
                    name, path
                )));
            }
        }
        Ok(())
    }
}

/// Login-log tail forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// Channel that receives login alerts; forwarding is off when unset
    #[serde(default)]
    pub channel: Option<String>,

    /// Events older than this are discarded (in seconds)
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            channel: None,
            recency_window_secs: default_recency_window_secs(),
        }
    }
}

impl TailConfig {
    /// Validate the tail configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.recency_window_secs == 0 {
            return Err(crate::Error::config("Tail recency window must be > 0"));
        }
        if self.channel.as_deref().is_some_and(str::is_empty) {
            return Err(crate::Error::config("Tail channel cannot be empty"));
        }
        Ok(())
    }
}

fn default_recency_window_secs() -> u64 {
    10
}

/// A tracked feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed name; also the poll-state key, so it must be a single path segment
    pub name: String,

    /// Channel that receives announcements
    pub channel: String,

    /// Sources in fallback order (primary first)
    pub sources: Vec<FeedSourceConfig>,

    /// Poll interval (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Whether this feed is polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FeedConfig {
    /// Create a new feed configuration with the default interval
    pub fn new(name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            sources: Vec::new(),
            interval_secs: default_poll_interval_secs(),
            enabled: true,
        }
    }

    /// Append a source to the fallback chain
    pub fn with_source(mut self, source: FeedSourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the poll interval
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Validate the feed configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("Feed name cannot be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Feed name '{}' may only contain ASCII letters, digits, '-' and '_'",
                self.name
            )));
        }
        if self.channel.is_empty() {
            return Err(crate::Error::config(format!(
                "Feed '{}' has no announcement channel",
                self.name
            )));
        }
        if self.sources.is_empty() {
            return Err(crate::Error::config(format!(
                "Feed '{}' has no sources",
                self.name
            )));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config(format!(
                "Feed '{}' poll interval must be > 0",
                self.name
            )));
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

/// Feed source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedSourceConfig {
    /// Keyed structured-query API (primary)
    DataApi {
        /// API key; the source reports itself unavailable without one
        api_key: Option<String>,
        /// Publisher channel identifier
        channel_id: String,
        /// Override for the API base URL
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Unauthenticated syndication feed (fallback)
    Syndication {
        /// Publisher channel identifier
        channel_id: String,
        /// Override for the feed base URL
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FeedSourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FeedSourceConfig::DataApi { channel_id, .. }
            | FeedSourceConfig::Syndication { channel_id, .. } => {
                if channel_id.is_empty() {
                    return Err(crate::Error::config("Feed source channel id cannot be empty"));
                }
                Ok(())
            }
            FeedSourceConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom feed source factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            FeedSourceConfig::DataApi { .. } => "data_api",
            FeedSourceConfig::Syndication { .. } => "syndication",
            FeedSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Command front end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Prefix that marks a message as a command
    #[serde(default = "default_command_prefix")]
    pub prefix: String,

    /// Duration applied when `ban` omits one (default: 1h); `null` makes
    /// such bans permanent
    #[serde(default = "default_ban_duration")]
    pub default_ban_duration: Option<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefix: default_command_prefix(),
            default_ban_duration: default_ban_duration(),
        }
    }
}

impl CommandConfig {
    /// Validate the command configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(crate::Error::config(
                "Command prefix must be non-empty and contain no whitespace",
            ));
        }
        if let Some(token) = &self.default_ban_duration {
            token
                .parse::<crate::duration::DurationToken>()
                .map_err(|e| crate::Error::config(format!("Default ban duration: {}", e)))?;
        }
        Ok(())
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_ban_duration() -> Option<String> {
    Some("1h".to_string())
}
