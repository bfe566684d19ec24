// # gremlind - gremlin Daemon
//
// This is a THIN integration layer. Ban, giveaway, tail and poll logic lives
// in gremlin-core; the daemon only wires it together.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Registering the store, sink and feed-source plugins
// 4. Starting the tail forwarder, the feed pollers, the liveness probe and
//    the operator console
// 5. Stopping them on SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Store
// - `GREMLIN_STORE_TYPE`: `memory` or `rtdb` (default: `rtdb` when a URL is set)
// - `GREMLIN_STORE_URL`: Database root URL (for rtdb)
// - `GREMLIN_STORE_AUTH`: Optional database auth token
// - `GREMLIN_TAIL_POLL_MS`: Tail subscription poll interval in milliseconds
//
// ### Notifications
// - `GREMLIN_SINK_TYPE`: `log` or `discord` (default: `discord` when a token is set)
// - `GREMLIN_DISCORD_TOKEN`: Bot token
// - `GREMLIN_LOG_CHANNEL`: Channel for login alerts (forwarding is off when unset)
// - `GREMLIN_RECENCY_WINDOW_SECS`: Login events older than this are dropped
//
// ### Feed
// - `GREMLIN_FEED_NAME`: Feed name, also its poll-state key (default: `uploads`)
// - `GREMLIN_FEED_CHANNEL`: Channel for upload announcements
// - `GREMLIN_FEED_SOURCE_ID`: Publisher channel id (polling is off when unset)
// - `GREMLIN_FEED_API_KEY`: Data API key; without it only the Atom feed is used
// - `GREMLIN_POLL_INTERVAL_SECS`: Seconds between poll cycles
//
// ### Commands
// - `GREMLIN_COMMAND_PREFIX`: Command prefix (default: `!`)
// - `GREMLIN_DEFAULT_BAN_DURATION`: Duration used when `ban` omits one (default: 1h)
//
// ### Process
// - `GREMLIN_HEALTH_PORT` (or `PORT`): Liveness probe port (default: 3000)
// - `GREMLIN_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export GREMLIN_STORE_URL=https://my-project.firebaseio.com
// export GREMLIN_DISCORD_TOKEN=your_bot_token
// export GREMLIN_LOG_CHANNEL=112233445566778899
// export GREMLIN_FEED_CHANNEL=998877665544332211
// export GREMLIN_FEED_SOURCE_ID=UCxxxxxxxxxxxxxxxxxxxxxx
//
// gremlind
// ```

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use gremlin_core::config::{
    CommandConfig, FeedConfig, FeedSourceConfig, GremlinConfig, SinkConfig, StoreConfig,
    StorePaths, TailConfig,
};
use gremlin_core::{
    BanRegistry, Caller, ChangePoller, Clock, CommandRouter, EntryRegistry, EventTailForwarder,
    PluginRegistry, PresenceDirectory, SystemClock,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long background tasks get to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum GremlinExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<GremlinExitCode> for ExitCode {
    fn from(code: GremlinExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, as read from the environment
#[derive(Debug, Clone, Default)]
struct Config {
    store_type: String,
    store_url: Option<String>,
    store_auth: Option<String>,
    tail_poll_ms: Option<u64>,
    sink_type: String,
    discord_token: Option<String>,
    log_channel: Option<String>,
    recency_window_secs: Option<u64>,
    feed_name: String,
    feed_channel: Option<String>,
    feed_source_id: Option<String>,
    feed_api_key: Option<String>,
    poll_interval_secs: Option<u64>,
    command_prefix: Option<String>,
    default_ban_duration: Option<String>,
    health_port: u16,
    log_level: String,
}

/// Read a variable, treating an empty value as unset
fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a numeric variable
fn env_num<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_opt(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a number. Got: {}", name, raw)),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let store_url = env_opt("GREMLIN_STORE_URL");
        let discord_token = env_opt("GREMLIN_DISCORD_TOKEN");

        let health_port = match env_num::<u16>("GREMLIN_HEALTH_PORT")? {
            Some(port) => port,
            None => env_num::<u16>("PORT")?.unwrap_or(3000),
        };

        Ok(Self {
            store_type: env_opt("GREMLIN_STORE_TYPE").unwrap_or_else(|| {
                let kind = if store_url.is_some() { "rtdb" } else { "memory" };
                kind.to_string()
            }),
            store_url,
            store_auth: env_opt("GREMLIN_STORE_AUTH"),
            tail_poll_ms: env_num("GREMLIN_TAIL_POLL_MS")?,
            sink_type: env_opt("GREMLIN_SINK_TYPE").unwrap_or_else(|| {
                let kind = if discord_token.is_some() { "discord" } else { "log" };
                kind.to_string()
            }),
            discord_token,
            log_channel: env_opt("GREMLIN_LOG_CHANNEL"),
            recency_window_secs: env_num("GREMLIN_RECENCY_WINDOW_SECS")?,
            feed_name: env_opt("GREMLIN_FEED_NAME").unwrap_or_else(|| "uploads".to_string()),
            feed_channel: env_opt("GREMLIN_FEED_CHANNEL"),
            feed_source_id: env_opt("GREMLIN_FEED_SOURCE_ID"),
            feed_api_key: env_opt("GREMLIN_FEED_API_KEY"),
            poll_interval_secs: env_num("GREMLIN_POLL_INTERVAL_SECS")?,
            command_prefix: env_opt("GREMLIN_COMMAND_PREFIX"),
            default_ban_duration: env_opt("GREMLIN_DEFAULT_BAN_DURATION"),
            health_port,
            log_level: env_opt("GREMLIN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the environment-level settings
    ///
    /// Structural checks (paths, feed names, duration tokens) are left to
    /// [`GremlinConfig::validate`]; this covers what only the daemon knows.
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "memory" => {
                if self.store_url.is_some() {
                    anyhow::bail!(
                        "GREMLIN_STORE_URL is set but GREMLIN_STORE_TYPE=memory. \
                        Unset one of them."
                    );
                }
            }
            "rtdb" => {
                let Some(url) = &self.store_url else {
                    anyhow::bail!(
                        "GREMLIN_STORE_URL is required when GREMLIN_STORE_TYPE=rtdb. \
                        Set it via: export GREMLIN_STORE_URL=https://my-project.firebaseio.com"
                    );
                };
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    anyhow::bail!(
                        "GREMLIN_STORE_URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    );
                }
                if url.starts_with("http://") {
                    eprintln!(
                        "WARNING: GREMLIN_STORE_URL uses HTTP (not HTTPS). \
                        The auth token would travel in clear text."
                    );
                }
            }
            other => anyhow::bail!(
                "GREMLIN_STORE_TYPE '{}' is not supported. \
                Supported types: memory, rtdb",
                other
            ),
        }

        match self.sink_type.as_str() {
            "log" => {}
            "discord" => {
                let Some(token) = &self.discord_token else {
                    anyhow::bail!(
                        "GREMLIN_DISCORD_TOKEN is required when GREMLIN_SINK_TYPE=discord"
                    );
                };
                let lower = token.to_lowercase();
                if lower.contains("your_") || lower.contains("replace_me") || lower == "token" {
                    anyhow::bail!(
                        "GREMLIN_DISCORD_TOKEN appears to be a placeholder. \
                        Use the bot token from the developer portal."
                    );
                }
            }
            other => anyhow::bail!(
                "GREMLIN_SINK_TYPE '{}' is not supported. \
                Supported types: log, discord",
                other
            ),
        }

        for (name, channel) in [
            ("GREMLIN_LOG_CHANNEL", &self.log_channel),
            ("GREMLIN_FEED_CHANNEL", &self.feed_channel),
        ] {
            if let Some(channel) = channel
                && !channel.chars().all(|c| c.is_ascii_digit())
            {
                anyhow::bail!("{} must be a numeric channel id. Got: {}", name, channel);
            }
        }

        if self.feed_source_id.is_some() && self.feed_channel.is_none() {
            anyhow::bail!(
                "GREMLIN_FEED_CHANNEL is required when GREMLIN_FEED_SOURCE_ID is set"
            );
        }

        if let Some(interval) = self.poll_interval_secs
            && !(10..=3600).contains(&interval)
        {
            anyhow::bail!(
                "GREMLIN_POLL_INTERVAL_SECS must be between 10 and 3600 seconds. Got: {}",
                interval
            );
        }

        if let Some(window) = self.recency_window_secs
            && !(1..=3600).contains(&window)
        {
            anyhow::bail!(
                "GREMLIN_RECENCY_WINDOW_SECS must be between 1 and 3600 seconds. Got: {}",
                window
            );
        }

        if let Some(ms) = self.tail_poll_ms
            && !(250..=60_000).contains(&ms)
        {
            anyhow::bail!(
                "GREMLIN_TAIL_POLL_MS must be between 250 and 60000. Got: {}",
                ms
            );
        }

        if self.health_port == 0 {
            anyhow::bail!("GREMLIN_HEALTH_PORT cannot be 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GREMLIN_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration
    fn to_core(&self) -> Result<GremlinConfig> {
        let store = match self.store_type.as_str() {
            "rtdb" => StoreConfig::Rtdb {
                database_url: self.store_url.clone().unwrap_or_default(),
                auth_token: self.store_auth.clone(),
                tail_poll_interval_ms: self.tail_poll_ms.unwrap_or(2000),
            },
            _ => StoreConfig::Memory,
        };

        let sink = match self.sink_type.as_str() {
            "discord" => SinkConfig::Discord {
                bot_token: self.discord_token.clone().unwrap_or_default(),
            },
            _ => SinkConfig::Log,
        };

        let mut tail = TailConfig {
            channel: self.log_channel.clone(),
            ..TailConfig::default()
        };
        if let Some(window) = self.recency_window_secs {
            tail.recency_window_secs = window;
        }

        let mut feeds = Vec::new();
        if let (Some(channel), Some(source_id)) = (&self.feed_channel, &self.feed_source_id) {
            let mut feed = FeedConfig::new(self.feed_name.clone(), channel.clone())
                .with_source(FeedSourceConfig::DataApi {
                    api_key: self.feed_api_key.clone(),
                    channel_id: source_id.clone(),
                    base_url: None,
                })
                .with_source(FeedSourceConfig::Syndication {
                    channel_id: source_id.clone(),
                    base_url: None,
                });
            if let Some(interval) = self.poll_interval_secs {
                feed = feed.with_interval_secs(interval);
            }
            feeds.push(feed);
        }

        let mut commands = CommandConfig::default();
        if let Some(duration) = &self.default_ban_duration {
            commands.default_ban_duration = Some(duration.clone());
        }
        if let Some(prefix) = &self.command_prefix {
            commands.prefix = prefix.clone();
        }

        let config = GremlinConfig {
            store,
            sink,
            paths: StorePaths::default(),
            tail,
            feeds,
            commands,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return GremlinExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return GremlinExitCode::ConfigError.into();
    }

    let core_config = match config.to_core() {
        Ok(core) => core,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return GremlinExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GremlinExitCode::ConfigError.into();
    }

    info!("Starting gremlind daemon");
    info!(
        "Configuration loaded: store={}, sink={}, {} feed(s)",
        core_config.store.type_name(),
        core_config.sink.type_name(),
        core_config.feeds.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GremlinExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(core_config, config.health_port).await {
            error!("Daemon error: {}", e);
            GremlinExitCode::RuntimeError
        } else {
            GremlinExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the plugin registry with every compiled-in backend
fn build_registry() -> PluginRegistry {
    let registry = PluginRegistry::with_defaults();

    #[cfg(feature = "rtdb")]
    {
        info!("Registering REST store");
        gremlin_store_rtdb::register(&registry);
    }

    #[cfg(feature = "feeds")]
    {
        info!("Registering HTTP feed sources");
        gremlin_feed_http::register(&registry);
    }

    #[cfg(feature = "discord")]
    {
        info!("Registering Discord sink");
        gremlin_notify_discord::register(&registry);
    }

    registry
}

/// Run the daemon
async fn run_daemon(config: GremlinConfig, health_port: u16) -> Result<()> {
    let registry = build_registry();

    let store = registry.create_store(&config.store)?;
    let sink = registry.create_sink(&config.sink)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    if config.sink.type_name() == "log" {
        warn!("No bot token configured: notifications are only logged (dry-run)");
    }

    let mut tasks: Vec<(String, JoinHandle<()>)> = Vec::new();
    let mut stops: Vec<oneshot::Sender<()>> = Vec::new();

    // Login-log tail
    if let Some(channel) = &config.tail.channel {
        let forwarder = EventTailForwarder::new(
            sink.clone(),
            clock.clone(),
            channel.clone(),
            Duration::from_secs(config.tail.recency_window_secs),
        );
        let stream = store.subscribe_tail(&config.paths.login_logs, 1);
        let (tx, rx) = oneshot::channel();
        stops.push(tx);
        tasks.push((
            "tail forwarder".to_string(),
            tokio::spawn(async move {
                let stats = forwarder.consume_with_shutdown(stream, rx).await;
                info!("Tail forwarder stopped: {:?}", stats);
            }),
        ));
        info!("Forwarding {} to channel {}", config.paths.login_logs, channel);
    } else {
        info!("No log channel configured, login alerts disabled");
    }

    // Feed pollers
    for feed in config.feeds.iter().filter(|f| f.enabled) {
        let sources = registry.create_feed_sources(&feed.sources)?;
        let poller = ChangePoller::new(feed, sources, store.clone(), sink.clone(), &config.paths);
        let (tx, rx) = oneshot::channel();
        stops.push(tx);
        tasks.push((
            format!("poller {}", feed.name),
            tokio::spawn(async move { poller.run_with_shutdown(rx).await }),
        ));
    }

    // Command surface
    let router = CommandRouter::new(
        BanRegistry::new(store.clone(), clock.clone(), &config.paths),
        EntryRegistry::new(store.clone(), clock.clone(), &config.paths),
        PresenceDirectory::new(store.clone(), &config.paths),
        config.commands.clone(),
    );
    let console = tokio::spawn(run_console(router));

    // Liveness probe
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", health_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind health port {}: {}", health_port, e))?;
    info!("Liveness probe listening on port {}", health_port);
    let health = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_router()).await {
            error!("Liveness probe stopped: {}", e);
        }
    });

    info!("Daemon initialized successfully ({} store)", store.store_name());

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    console.abort();
    health.abort();
    for stop in stops {
        let _ = stop.send(());
    }

    for (name, task) in tasks {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => debug!("{} stopped", name),
            Ok(Err(e)) => warn!("{} ended abnormally: {}", name, e),
            Err(_) => warn!("{} did not stop within {:?}", name, SHUTDOWN_GRACE),
        }
    }

    Ok(())
}

/// Liveness probe routes
fn health_router() -> Router {
    Router::new().route("/", get(|| async { "gremlin is running" }))
}

/// Read commands from stdin as the local operator and log the replies
async fn run_console(router: CommandRouter) {
    let operator = Caller::operator();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match router.dispatch(&operator, line).await {
                    Some(reply) => info!("{}", reply),
                    None => debug!("Console input is not a command: {}", line),
                }
            }
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            store_type: "memory".to_string(),
            sink_type: "log".to_string(),
            feed_name: "uploads".to_string(),
            health_port: 3000,
            log_level: "info".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = base();
        assert!(config.validate().is_ok());

        let core = config.to_core().unwrap();
        assert!(core.feeds.is_empty());
        assert!(core.tail.channel.is_none());
        assert_eq!(core.commands.default_ban_duration.as_deref(), Some("1h"));
    }

    #[test]
    fn test_ban_duration_override() {
        let config = Config {
            default_ban_duration: Some("30m".to_string()),
            ..base()
        };
        let core = config.to_core().unwrap();
        assert_eq!(core.commands.default_ban_duration.as_deref(), Some("30m"));
    }

    #[test]
    fn test_rtdb_requires_url() {
        let config = Config {
            store_type: "rtdb".to_string(),
            ..base()
        };
        assert!(config.validate().is_err());

        let config = Config {
            store_type: "rtdb".to_string(),
            store_url: Some("ftp://db".to_string()),
            ..base()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discord_requires_real_token() {
        let config = Config {
            sink_type: "discord".to_string(),
            ..base()
        };
        assert!(config.validate().is_err());

        let config = Config {
            sink_type: "discord".to_string(),
            discord_token: Some("your_token".to_string()),
            ..base()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feed_builds_primary_then_fallback() {
        let config = Config {
            feed_channel: Some("123".to_string()),
            feed_source_id: Some("UC1".to_string()),
            poll_interval_secs: Some(120),
            ..base()
        };
        assert!(config.validate().is_ok());

        let core = config.to_core().unwrap();
        let feed = &core.feeds[0];
        assert_eq!(feed.interval_secs, 120);
        let types: Vec<&str> = feed.sources.iter().map(|s| s.type_name()).collect();
        assert_eq!(types, vec!["data_api", "syndication"]);
    }

    #[test]
    fn test_range_checks() {
        let config = Config {
            poll_interval_secs: Some(5),
            ..base()
        };
        assert!(config.validate().is_err());

        let config = Config {
            log_channel: Some("general".to_string()),
            ..base()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_ban_duration: Some("forever".to_string()),
            ..base()
        };
        assert!(config.to_core().is_err());
    }
}
