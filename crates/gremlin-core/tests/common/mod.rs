//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles for the core capabilities:
//! a recording sink, a scripted feed source, and a store that fails every
//! call.

#![allow(dead_code)]

use gremlin_core::config::StorePaths;
use gremlin_core::error::{Error, Result};
use gremlin_core::traits::{
    FeedItem, FeedSource, FetchOutcome, KvStore, NotificationSink, TailEntry, TailStream,
};
use gremlin_core::{BanRegistry, EntryRegistry, ManualClock, MemoryKvStore, PresenceDirectory};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A NotificationSink that records every message it accepts
#[derive(Clone, Default)]
pub struct RecordingSink {
    /// Call counter for send()
    send_call_count: Arc<AtomicUsize>,
    /// Accepted (channel, text) pairs
    messages: Arc<Mutex<Vec<(String, String)>>>,
    /// Reject every message when set
    failing: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every send fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Get the number of times send() was called
    pub fn send_call_count(&self) -> usize {
        self.send_call_count.load(Ordering::SeqCst)
    }

    /// Get the accepted messages
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        self.send_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::notify("recording sink set to fail"));
        }
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A FeedSource that replays a fixed script, one answer per call
///
/// Once the script runs out every call answers `Empty`.
pub struct ScriptedFeedSource {
    name: &'static str,
    script: Mutex<VecDeque<Result<FetchOutcome>>>,
    /// Call counter for fetch_newest()
    fetch_call_count: Arc<AtomicUsize>,
}

impl ScriptedFeedSource {
    pub fn new(name: &'static str, script: Vec<Result<FetchOutcome>>) -> Self {
        Self {
            name,
            script: Mutex::new(script.into()),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always returns items with the given ids, in order
    pub fn items(name: &'static str, ids: &[&str]) -> Self {
        Self::new(name, ids.iter().map(|id| Ok(item(id))).collect())
    }

    /// Shared handle on the fetch counter
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetch_call_count)
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeedSource {
    async fn fetch_newest(&self) -> Result<FetchOutcome> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(FetchOutcome::Empty))
    }

    fn source_name(&self) -> &'static str {
        self.name
    }
}

/// A feed item with a predictable title and link
pub fn item(id: &str) -> FetchOutcome {
    FetchOutcome::Item(FeedItem::new(
        id,
        format!("Upload {}", id),
        format!("https://www.youtube.com/watch?v={}", id),
    ))
}

/// A KvStore whose every call fails
pub struct FailingStore;

#[async_trait::async_trait]
impl KvStore for FailingStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        Err(Error::store(format!("read {} refused", path)))
    }

    async fn set(&self, path: &str, _value: Value) -> Result<()> {
        Err(Error::store(format!("write {} refused", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        Err(Error::store(format!("delete {} refused", path)))
    }

    fn subscribe_tail(&self, _path: &str, _limit: usize) -> TailStream {
        Box::pin(tokio_stream::empty::<TailEntry>())
    }

    fn store_name(&self) -> &'static str {
        "failing"
    }
}

/// Registries wired to one memory store and one manual clock
pub struct Fixture {
    pub store: MemoryKvStore,
    pub clock: ManualClock,
    pub bans: BanRegistry,
    pub entries: EntryRegistry,
    pub presence: PresenceDirectory,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryKvStore::new();
        let clock = ManualClock::new(chrono::Utc::now());
        let paths = StorePaths::default();
        let shared: Arc<dyn KvStore> = Arc::new(store.clone());

        Self {
            bans: BanRegistry::new(shared.clone(), Arc::new(clock.clone()), &paths),
            entries: EntryRegistry::new(shared.clone(), Arc::new(clock.clone()), &paths),
            presence: PresenceDirectory::new(shared, &paths),
            store,
            clock,
        }
    }
}
