// # Tracing Sink
//
// NotificationSink that writes every message to the log instead of a chat
// channel. Used when no chat credentials are configured, so the daemon can run
// end to end in dry-run mode.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::Error;
use crate::config::SinkConfig;
use crate::traits::notification_sink::{NotificationSink, NotificationSinkFactory};

/// Sink that logs messages at INFO level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a new tracing sink
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingSink {
    async fn send(&self, channel: &str, text: &str) -> Result<(), Error> {
        info!(channel = %channel, "[DRY-RUN] {}", text);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for creating tracing sinks
pub struct TracingSinkFactory;

impl NotificationSinkFactory for TracingSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Arc<dyn NotificationSink>, Error> {
        match config {
            SinkConfig::Log => Ok(Arc::new(TracingSink::new())),
            _ => Err(Error::config("Invalid config for log sink")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_accepts_everything() {
        let sink = TracingSink::new();
        assert!(sink.send("any", "message").await.is_ok());
        assert_eq!(sink.sink_name(), "log");
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        assert!(TracingSinkFactory.create(&SinkConfig::Log).is_ok());
        assert!(
            TracingSinkFactory
                .create(&SinkConfig::Discord {
                    bot_token: "t".into()
                })
                .is_err()
        );
    }
}
