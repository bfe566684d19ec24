// # Feed Source Trait
//
// Defines the interface for fetching the newest publication of an external
// content feed.
//
// ## Fallback Chains
//
// The change poller holds an ordered list of sources (primary first) and asks
// each in turn until one produces an item. Every source reports a tagged outcome so the
// poller can tell "nothing published" apart from "could not ask":
//
// - `Ok(FetchOutcome::Item(_))`: newest item found, stop
// - `Ok(FetchOutcome::Empty)`: source answered, feed has no items, try next
// - `Ok(FetchOutcome::Unavailable(_))`: source not usable (e.g. no credential), try next
// - `Err(Error)`: transport/parse failure, try next

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single publication of a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Source-defined identifier, unique within the feed
    pub id: String,
    /// Human-readable title
    pub title: String,
    /// Link to the publication
    pub link: String,
}

impl FeedItem {
    /// Create a new feed item
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Tagged result of asking one source for its newest item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The newest item of the feed
    Item(FeedItem),
    /// The source answered but the feed has no items
    Empty,
    /// The source cannot be used right now; the reason is logged
    Unavailable(String),
}

/// Trait for feed source implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ One outbound request (or one short request sequence) per call
/// - ✅ Parse source-specific payloads
///
/// ## Forbidden Capabilities
/// - ❌ Retry on failure (the next source in the chain is the retry)
/// - ❌ Read or write poll state (owned by the change poller)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the newest item of the feed
    async fn fetch_newest(&self) -> Result<FetchOutcome, crate::Error>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing feed sources from configuration
pub trait FeedSourceFactory: Send + Sync {
    /// Create a FeedSource instance from configuration
    fn create(
        &self,
        config: &crate::config::FeedSourceConfig,
    ) -> Result<Box<dyn FeedSource>, crate::Error>;
}
