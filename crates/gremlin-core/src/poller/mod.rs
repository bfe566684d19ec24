//! Deduplicated feed change poller
//!
//! The ChangePoller is responsible for:
//! - Asking an ordered chain of FeedSources for the newest item
//! - Comparing it against the last-seen id persisted in the KvStore
//! - Persisting the new id, then announcing it via the NotificationSink
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     Item      ┌──────────────┐
//! │ FeedSource 1 │──────────────▶│              │
//! └──────────────┘  Empty, Err   │              │
//!        │        or Unavailable │ ChangePoller │
//!        ▼                       │              │
//! ┌──────────────┐               │              │
//! │ FeedSource 2 │──────────────▶│              │
//! └──────────────┘               └──────────────┘
//!                                        │
//!                 ┌──────────────────────┴──────────────┐
//!                 ▼                                     ▼
//!         ┌──────────────┐                     ┌──────────────────┐
//!         │   KvStore    │                     │ NotificationSink │
//!         │ (lastSeenId) │                     │    (announce)    │
//!         └──────────────┘                     └──────────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Ask each source in order until one produces an item
//! 2. No item from any source: nothing to do
//! 3. Read `lastSeenId`; same id: nothing to do
//! 4. Write the new id, **then** notify
//!
//! Writing first means a crash between the two steps loses one announcement
//! instead of repeating it on the next cycle.

use crate::config::{FeedConfig, StorePaths};
use crate::error::Result;
use crate::store::join_path;
use crate::traits::{FeedItem, FeedSource, FetchOutcome, KvStore, NotificationSink};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Key under the feed's namespace holding the last announced id
pub const LAST_SEEN_KEY: &str = "lastSeenId";

/// Result of a single poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// New item persisted and announced
    Notified {
        item: FeedItem,
        /// Source that produced the item
        source: String,
        /// Whether the sink accepted the announcement
        delivered: bool,
    },

    /// Newest item was already announced
    Unchanged { id: String },

    /// No source produced an item
    NoItem,
}

/// Polls one feed and announces new items
///
/// ## Lifecycle
///
/// 1. Create with [`ChangePoller::new()`]
/// 2. Spawn [`ChangePoller::run_with_shutdown()`] on its own task
/// 3. Cycles run once immediately, then every `interval`, until shutdown
///
/// ## Scheduling
///
/// All cycles run on one task. A cycle that outlasts the interval delays the
/// next tick instead of overlapping it.
pub struct ChangePoller {
    /// Feed name (used in logs and the state path)
    feed: String,

    /// Channel that receives announcements
    channel: String,

    /// Sources in priority order
    sources: Vec<Box<dyn FeedSource>>,

    /// Store holding the last-seen id
    store: Arc<dyn KvStore>,

    /// Announcement sink
    sink: Arc<dyn NotificationSink>,

    /// Full path of the last-seen id
    state_path: String,

    /// Time between cycles
    interval: Duration,
}

impl ChangePoller {
    /// Create a new change poller
    ///
    /// # Parameters
    ///
    /// - `feed`: Feed configuration (name, channel, interval)
    /// - `sources`: Sources built from `feed.sources`, primary first
    /// - `store`: Store holding dedup state
    /// - `sink`: Announcement sink
    /// - `paths`: Store namespaces
    pub fn new(
        feed: &FeedConfig,
        sources: Vec<Box<dyn FeedSource>>,
        store: Arc<dyn KvStore>,
        sink: Arc<dyn NotificationSink>,
        paths: &StorePaths,
    ) -> Self {
        Self {
            feed: feed.name.clone(),
            channel: feed.channel.clone(),
            sources,
            store,
            sink,
            state_path: join_path(&[&paths.notifications, &feed.name, LAST_SEEN_KEY]),
            interval: Duration::from_secs(feed.interval_secs),
        }
    }

    /// Path of the persisted last-seen id
    pub fn state_path(&self) -> &str {
        &self.state_path
    }

    /// Feed name
    pub fn feed_name(&self) -> &str {
        &self.feed
    }

    /// Ask each source in order until one produces an item
    ///
    /// Returns the item and the name of the source that produced it, or
    /// `None` when no source produced one. An empty feed falls through to the
    /// next source like an unavailable one.
    pub async fn newest_item(&self) -> Option<(FeedItem, &'static str)> {
        for source in &self.sources {
            match source.fetch_newest().await {
                Ok(FetchOutcome::Item(item)) => return Some((item, source.source_name())),
                Ok(FetchOutcome::Empty) => {
                    debug!(
                        "[{}] {} has no items, trying next source",
                        self.feed,
                        source.source_name()
                    );
                }
                Ok(FetchOutcome::Unavailable(reason)) => {
                    debug!(
                        "[{}] {} unavailable: {}",
                        self.feed,
                        source.source_name(),
                        reason
                    );
                }
                Err(e) => {
                    warn!(
                        "[{}] {} failed, trying next source: {}",
                        self.feed,
                        source.source_name(),
                        e
                    );
                }
            }
        }
        warn!("[{}] No source returned an item this cycle", self.feed);
        None
    }

    /// Read the last announced id
    ///
    /// A value that is not a string is treated as absent so a corrupt entry
    /// is overwritten rather than wedging the feed.
    pub async fn last_seen(&self) -> Result<Option<String>> {
        Ok(match self.store.get(&self.state_path).await? {
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                warn!(
                    "[{}] Ignoring non-string state at {}: {}",
                    self.feed, self.state_path, other
                );
                None
            }
            None => None,
        })
    }

    /// Run a single poll cycle
    ///
    /// # Returns
    ///
    /// - `Ok(PollOutcome)`: What the cycle did
    /// - `Err(Error::Store)`: Reading or writing the last-seen id failed;
    ///   nothing was announced
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let Some((item, source)) = self.newest_item().await else {
            return Ok(PollOutcome::NoItem);
        };

        if self.last_seen().await?.as_deref() == Some(item.id.as_str()) {
            debug!("[{}] {} already announced", self.feed, item.id);
            return Ok(PollOutcome::Unchanged { id: item.id });
        }

        self.store
            .set(&self.state_path, Value::String(item.id.clone()))
            .await?;

        let delivered = crate::traits::notify_best_effort(
            self.sink.as_ref(),
            &self.channel,
            &announcement(&item),
        )
        .await;

        info!(
            "[{}] New item {} from {} (announced: {})",
            self.feed, item.id, source, delivered
        );

        Ok(PollOutcome::Notified {
            item,
            source: source.to_string(),
            delivered,
        })
    }

    /// Run cycles until `shutdown_rx` fires
    ///
    /// An in-flight cycle finishes before the loop checks for shutdown again,
    /// so a stop never interrupts the write-then-notify step.
    pub async fn run_with_shutdown(&self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(
            "[{}] Polling {} source(s) every {}s",
            self.feed,
            self.sources.len(),
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!("[{}] Poll cycle failed: {}", self.feed, e);
                    }
                }

                _ = &mut shutdown_rx => {
                    info!("[{}] Shutdown signal received", self.feed);
                    break;
                }
            }
        }
    }
}

/// Announcement text for a new item
pub fn announcement(item: &FeedItem) -> String {
    format!("📺 **New upload:** {}\n{}", item.title, item.link)
}
