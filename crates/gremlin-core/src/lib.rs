// # gremlin-core
//
// Core library for the gremlin community moderation and notification daemon.
//
// ## Architecture Overview
//
// Three long-lived concerns share one external key-value store:
// - **BanRegistry**: Time-bound bans keyed by network address or device token
// - **EventTailForwarder**: Forwards fresh login events to a notification sink
// - **ChangePoller**: Announces new feed items, deduplicated against stored state
//
// Around them sit the command front end (**CommandRouter**), the giveaway
// **EntryRegistry**, the online-user **PresenceDirectory**, and the
// **PluginRegistry** that builds store, sink and feed backends from config.
//
// ## Capabilities
//
// - **KvStore**: Hierarchical get/set/delete plus tail subscriptions
// - **NotificationSink**: Best-effort `send(channel, text)`
// - **FeedSource**: Newest-item lookup, chained primary-then-fallback
// - **Clock**: Injected wall clock so expiry and recency are testable
//
// Every component receives its capabilities at construction; there is no
// global store handle.

pub mod bans;
pub mod clock;
pub mod commands;
pub mod config;
pub mod duration;
pub mod entries;
pub mod error;
pub mod identity;
pub mod poller;
pub mod presence;
pub mod registry;
pub mod sink;
pub mod store;
pub mod tail;
pub mod traits;

// Re-export core types for convenience
pub use bans::{BanRecord, BanRegistry};
pub use clock::{ManualClock, SystemClock};
pub use commands::{Caller, Command, CommandRouter};
pub use config::{FeedConfig, FeedSourceConfig, GremlinConfig, SinkConfig, StoreConfig, StorePaths};
pub use duration::{DurationToken, Expiry, parse_expiry};
pub use entries::{EntryRegistry, GiveawayEntry};
pub use error::{Error, Result};
pub use identity::{BanCategory, CanonicalKey, normalize};
pub use poller::{ChangePoller, PollOutcome};
pub use presence::{OnlineUser, PresenceDirectory};
pub use registry::PluginRegistry;
pub use sink::TracingSink;
pub use store::MemoryKvStore;
pub use tail::{EventTailForwarder, ForwardOutcome, LogEvent};
pub use traits::{Clock, FeedItem, FeedSource, FetchOutcome, KvStore, NotificationSink};
