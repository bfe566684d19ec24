//! Core traits for the gremlin system
//!
//! This module defines the abstract capabilities the core is built on.
//!
//! - [`KvStore`]: External hierarchical key-value store
//! - [`NotificationSink`]: Best-effort message delivery
//! - [`FeedSource`]: Newest-item lookup for an external content feed
//! - [`Clock`]: Wall-clock access

pub mod clock;
pub mod feed_source;
pub mod kv_store;
pub mod notification_sink;

pub use clock::Clock;
pub use feed_source::{FeedItem, FeedSource, FeedSourceFactory, FetchOutcome};
pub use kv_store::{KvStore, KvStoreFactory, TailEntry, TailStream};
pub use notification_sink::{NotificationSink, NotificationSinkFactory, notify_best_effort};
