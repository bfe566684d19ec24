//! Recency-filtered login-log forwarder
//!
//! Subscribes to the newest entry of the append-only login log and forwards
//! each freshly appended event to the notification sink.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   TailEntry    ┌────────────────────┐   text   ┌──────────────────┐
//! │  KvStore    │───(stream)────▶│ EventTailForwarder │─────────▶│ NotificationSink │
//! │ tail(path,1)│                │  age < window ?    │          │  (best effort)   │
//! └─────────────┘                └────────────────────┘          └──────────────────┘
//! ```
//!
//! ## Recency Gate
//!
//! A subscription replays the current tail when it (re)connects. Events older
//! than the recency window are dropped so a restart does not re-announce old
//! logins. Duplicate deliveries inside the window are forwarded again; the
//! alert is informational and the window bounds how far back that can reach.

use crate::error::Result;
use crate::traits::{Clock, KvStore, NotificationSink, TailEntry, TailStream};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Default recency window
pub const DEFAULT_RECENCY_WINDOW: std::time::Duration = std::time::Duration::from_secs(10);

/// A login event appended by the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogEvent {
    /// When the login happened
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Account that logged in
    #[serde(rename = "email", default)]
    pub actor: Option<String>,
    /// Network origin
    #[serde(rename = "ip", default)]
    pub origin: Option<String>,
    /// Device token
    #[serde(default)]
    pub device: Option<String>,
}

impl LogEvent {
    /// Decode a tail entry
    pub fn from_entry(entry: &TailEntry) -> Result<Self> {
        Ok(serde_json::from_value(entry.value.clone())?)
    }

    /// Alert text sent to the sink
    pub fn alert_text(&self) -> String {
        format!(
            "🚨 **New Login Detected**\nUser: {}\nIP: {}\nDevice: {}",
            self.actor.as_deref().unwrap_or("unknown"),
            self.origin.as_deref().unwrap_or("unknown"),
            self.device.as_deref().unwrap_or("unknown"),
        )
    }
}

/// What happened to one delivered entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Sent to the sink
    Forwarded,
    /// Within the window, but the sink rejected it
    SinkFailed,
    /// Older than the recency window
    Stale {
        /// Event age in milliseconds
        age_ms: i64,
    },
    /// Entry could not be decoded as a LogEvent
    Malformed,
}

/// Totals for one subscription's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Alerts the sink accepted
    pub forwarded: usize,
    /// Fresh events the sink rejected
    pub sink_failed: usize,
    /// Events outside the recency window
    pub stale: usize,
    /// Undecodable entries
    pub malformed: usize,
}

impl ForwardStats {
    fn record(&mut self, outcome: &ForwardOutcome) {
        match outcome {
            ForwardOutcome::Forwarded => self.forwarded += 1,
            ForwardOutcome::SinkFailed => self.sink_failed += 1,
            ForwardOutcome::Stale { .. } => self.stale += 1,
            ForwardOutcome::Malformed => self.malformed += 1,
        }
    }

    fn merge(&mut self, other: ForwardStats) {
        self.forwarded += other.forwarded;
        self.sink_failed += other.sink_failed;
        self.stale += other.stale;
        self.malformed += other.malformed;
    }
}

/// An admitted event waiting for the sink
struct PendingAlert {
    actor: String,
    text: String,
}

/// Forwards fresh login events to a notification channel
///
/// ## Lifecycle
///
/// 1. Create with [`EventTailForwarder::new()`] (idle)
/// 2. [`EventTailForwarder::subscribe()`] moves it into a background task (listening)
/// 3. The task runs until the stream ends; the daemon uses
///    [`EventTailForwarder::consume_with_shutdown()`] instead so it can stop it
///
/// ## Delivery
///
/// While consuming a stream, each entry is aged against the clock when it is
/// received. Admitted alerts are queued to a single delivery task that sends
/// them in order, so a slow sink never delays the gate for later entries.
/// Queued alerts are still delivered when the stream ends or shutdown fires.
#[derive(Clone)]
pub struct EventTailForwarder {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    channel: String,
    recency_window: TimeDelta,
}

impl EventTailForwarder {
    /// Create a new forwarder
    ///
    /// # Parameters
    ///
    /// - `sink`: Where alerts are sent
    /// - `clock`: Clock used to age events
    /// - `channel`: Channel that receives alerts
    /// - `recency_window`: Events at least this old are discarded
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        channel: impl Into<String>,
        recency_window: std::time::Duration,
    ) -> Self {
        Self {
            sink,
            clock,
            channel: channel.into(),
            recency_window: TimeDelta::from_std(recency_window).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Whether an event is fresh enough to forward at `now`
    pub fn is_recent(&self, event: &LogEvent, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(event.timestamp) < self.recency_window
    }

    fn admit(&self, event: &LogEvent) -> std::result::Result<PendingAlert, ForwardOutcome> {
        let now = self.clock.now();
        if !self.is_recent(event, now) {
            let age_ms = now.signed_duration_since(event.timestamp).num_milliseconds();
            debug!("Discarding login event {}ms old", age_ms);
            return Err(ForwardOutcome::Stale { age_ms });
        }
        Ok(PendingAlert {
            actor: event.actor.clone().unwrap_or_else(|| "unknown".to_string()),
            text: event.alert_text(),
        })
    }

    fn admit_entry(&self, entry: &TailEntry) -> std::result::Result<PendingAlert, ForwardOutcome> {
        match LogEvent::from_entry(entry) {
            Ok(event) => self.admit(&event),
            Err(e) => {
                warn!("Skipping unreadable log entry {}: {}", entry.key, e);
                Err(ForwardOutcome::Malformed)
            }
        }
    }

    async fn deliver(
        sink: &dyn NotificationSink,
        channel: &str,
        alert: &PendingAlert,
    ) -> ForwardOutcome {
        if crate::traits::notify_best_effort(sink, channel, &alert.text).await {
            info!("Forwarded login alert for {}", alert.actor);
            ForwardOutcome::Forwarded
        } else {
            ForwardOutcome::SinkFailed
        }
    }

    /// Apply the recency gate to one event and forward it if it passes
    pub async fn handle_event(&self, event: &LogEvent) -> ForwardOutcome {
        match self.admit(event) {
            Ok(alert) => Self::deliver(self.sink.as_ref(), &self.channel, &alert).await,
            Err(outcome) => outcome,
        }
    }

    /// Decode one tail entry and handle it
    pub async fn handle_entry(&self, entry: &TailEntry) -> ForwardOutcome {
        match self.admit_entry(entry) {
            Ok(alert) => Self::deliver(self.sink.as_ref(), &self.channel, &alert).await,
            Err(outcome) => outcome,
        }
    }

    fn spawn_delivery(&self) -> (mpsc::UnboundedSender<PendingAlert>, JoinHandle<ForwardStats>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingAlert>();
        let sink = self.sink.clone();
        let channel = self.channel.clone();
        let handle = tokio::spawn(async move {
            let mut stats = ForwardStats::default();
            while let Some(alert) = rx.recv().await {
                let outcome = Self::deliver(sink.as_ref(), &channel, &alert).await;
                stats.record(&outcome);
            }
            stats
        });
        (tx, handle)
    }

    /// Consume a tail stream in delivery order until it ends
    pub async fn consume(&self, stream: TailStream) -> ForwardStats {
        self.consume_until(stream, std::future::pending::<()>()).await
    }

    /// Consume a tail stream until it ends or `shutdown_rx` fires
    pub async fn consume_with_shutdown(
        &self,
        stream: TailStream,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> ForwardStats {
        self.consume_until(stream, async move {
            let _ = shutdown_rx.await;
            info!("Shutdown signal received");
        })
        .await
    }

    async fn consume_until(
        &self,
        mut stream: TailStream,
        shutdown: impl Future<Output = ()>,
    ) -> ForwardStats {
        let (outbox, delivery) = self.spawn_delivery();
        let mut stats = ForwardStats::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(entry) => match self.admit_entry(&entry) {
                        Ok(alert) => {
                            if outbox.send(alert).is_err() {
                                warn!("Alert delivery task is gone, stopping login tail");
                                break;
                            }
                        }
                        Err(outcome) => stats.record(&outcome),
                    },
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        }

        // Closing the queue lets the delivery task drain and finish
        drop(outbox);
        match delivery.await {
            Ok(sent) => stats.merge(sent),
            Err(e) => warn!("Alert delivery task failed: {}", e),
        }
        debug!("Login tail ended: {:?}", stats);
        stats
    }

    /// Subscribe to the newest entry of `path` and forward from a background task
    pub fn subscribe(self, store: &dyn KvStore, path: &str) -> JoinHandle<ForwardStats> {
        info!(
            "Listening for login events on {} via {} (window {}s)",
            path,
            store.store_name(),
            self.recency_window.num_seconds()
        );
        let stream = store.subscribe_tail(path, 1);
        tokio::spawn(async move { self.consume(stream).await })
    }
}
