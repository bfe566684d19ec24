// # Notification Sink Trait
//
// Defines the interface for delivering text notifications to a channel.
//
// Delivery is best-effort: callers never retry, and a failed send must not
// affect anything that happens afterwards. [`notify_best_effort`] is the one
// place that swallows and logs sink errors.

use async_trait::async_trait;
use tracing::warn;

/// Trait for notification sink implementations
///
/// # Trust Level: Untrusted
///
/// Sinks perform exactly one outbound request per `send` call. They do not
/// retry, queue, or read the key-value store.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send `text` to the channel identified by `channel`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The sink accepted the message
    /// - `Err(Error)`: Transport, authentication or rate-limit failure
    async fn send(&self, channel: &str, text: &str) -> Result<(), crate::Error>;

    /// Sink name for logging
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing sinks from configuration
pub trait NotificationSinkFactory: Send + Sync {
    /// Create a NotificationSink instance from configuration
    fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<std::sync::Arc<dyn NotificationSink>, crate::Error>;
}

/// Send a notification, logging (not propagating) any failure
///
/// Returns `true` when the sink accepted the message.
pub async fn notify_best_effort(sink: &dyn NotificationSink, channel: &str, text: &str) -> bool {
    match sink.send(channel, text).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Notification via {} to channel {} failed: {}",
                sink.sink_name(),
                channel,
                e
            );
            false
        }
    }
}
