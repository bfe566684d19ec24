// # Key-Value Store Trait
//
// Defines the interface for the external, hierarchical key-value store that
// owns all durable state (bans, giveaway entries, poll state, login logs).
//
// ## Paths
//
// Paths are slash-separated strings such as `bans/address/1_2_3_4`. The core
// treats them as opaque namespaces; only the store knows how to map them.
//
// ## Usage
//
// ```rust,ignore
// use gremlin_core::KvStore;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* KvStore implementation */;
//
//     store.set("notifications/main/lastSeenId", "abc".into()).await?;
//     let seen = store.get("notifications/main/lastSeenId").await?;
//
//     let mut tail = store.subscribe_tail("loginLogs", 1);
//     while let Some(entry) = tail.next().await {
//         println!("appended {}: {}", entry.key, entry.value);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::pin::Pin;
use tokio_stream::Stream;

/// A child appended to a watched collection
#[derive(Debug, Clone, PartialEq)]
pub struct TailEntry {
    /// Child key inside the collection (push keys sort by append order)
    pub key: String,
    /// Raw child value
    pub value: Value,
}

impl TailEntry {
    /// Create a new tail entry
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Boxed stream of appended children
pub type TailStream = Pin<Box<dyn Stream<Item = TailEntry> + Send + 'static>>;

/// Trait for key-value store implementations
///
/// Implementations must be thread-safe: the command path, the tail forwarder
/// and the change poller all hold the same store.
///
/// # Consistency
///
/// There are no transactions and no concurrency tokens. Every write is a
/// blind overwrite; the last writer wins.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform network or in-memory I/O for the hierarchical value tree
/// - ✅ Spawn exactly one task per tail subscription to feed its stream
///
/// ## Forbidden Capabilities
/// - ❌ Interpret values (ban expiry, poll state, entries are owned by the registries)
/// - ❌ Retry failed writes (callers decide)
/// - ❌ Send notifications
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value at `path`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Value))`: The value (objects for interior nodes)
    /// - `Ok(None)`: Nothing stored at that path
    /// - `Err(Error)`: Store error
    async fn get(&self, path: &str) -> Result<Option<Value>, crate::Error>;

    /// Write `value` at `path`, replacing whatever was there
    async fn set(&self, path: &str, value: Value) -> Result<(), crate::Error>;

    /// Remove the value at `path` and everything below it
    ///
    /// Removing a missing path is not an error.
    async fn delete(&self, path: &str) -> Result<(), crate::Error>;

    /// Subscribe to children appended under `path`
    ///
    /// The stream first yields up to `limit` of the newest existing children
    /// (as a reconnecting subscription would), then every newly appended
    /// child in append order. It never ends while the store is alive.
    fn subscribe_tail(&self, path: &str, limit: usize) -> TailStream;

    /// Store backend name for logging
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing stores from configuration
pub trait KvStoreFactory: Send + Sync {
    /// Create a KvStore instance from configuration
    fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn KvStore>, crate::Error>;
}
