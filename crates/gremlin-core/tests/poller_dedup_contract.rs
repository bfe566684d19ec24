//! Contract Test: Poller Deduplication
//!
//! This test verifies that the change poller announces each transition of
//! the newest item exactly once.
//!
//! Constraints verified:
//! - Repeated ids are never re-announced
//! - Returning to an earlier id is a transition
//! - The new id is persisted before the sink is called
//! - Switching between primary and fallback does not cause a spurious announcement
//! - An empty primary feed falls through to the fallback
//! - Store failures abort the cycle without announcing
//!
//! If this test fails, someone has:
//! - Moved the state write after the notification
//! - Added in-memory dedup state that bypasses the store
//! - Let a store error escape as an announcement
//! - Made an empty answer end the source chain

mod common;

use common::*;
use gremlin_core::config::{FeedConfig, StorePaths};
use gremlin_core::error::{Error, Result};
use gremlin_core::traits::{FeedSource, FetchOutcome, KvStore, NotificationSink};
use gremlin_core::{ChangePoller, MemoryKvStore, PollOutcome};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn poller_over(
    sources: Vec<Box<dyn FeedSource>>,
    store: Arc<dyn KvStore>,
    sink: Arc<dyn NotificationSink>,
) -> ChangePoller {
    ChangePoller::new(
        &FeedConfig::new("uploads", "announcements"),
        sources,
        store,
        sink,
        &StorePaths::default(),
    )
}

#[tokio::test]
async fn repeated_ids_announce_only_transitions() {
    let sink = RecordingSink::new();
    let poller = poller_over(
        vec![Box::new(ScriptedFeedSource::items(
            "primary",
            &["A", "A", "B", "B", "A"],
        ))],
        Arc::new(MemoryKvStore::new()),
        Arc::new(sink.clone()),
    );

    let mut notified_cycles = Vec::new();
    for cycle in 1..=5 {
        if let PollOutcome::Notified { .. } = poller.poll_once().await.unwrap() {
            notified_cycles.push(cycle);
        }
    }

    assert_eq!(notified_cycles, vec![1, 3, 5]);
    assert_eq!(
        sink.send_call_count(),
        3,
        "Expected exactly three announcements, got {}",
        sink.send_call_count()
    );

    let texts: Vec<String> = sink.messages().into_iter().map(|(_, text)| text).collect();
    assert!(texts[0].contains("Upload A"));
    assert!(texts[1].contains("Upload B"));
    assert!(texts[2].contains("https://www.youtube.com/watch?v=A"));
}

#[tokio::test]
async fn existing_state_suppresses_first_announcement() {
    let store = MemoryKvStore::new();
    store
        .set("notifications/uploads/lastSeenId", json!("A"))
        .await
        .unwrap();

    let sink = RecordingSink::new();
    let poller = poller_over(
        vec![Box::new(ScriptedFeedSource::items("primary", &["A"]))],
        Arc::new(store),
        Arc::new(sink.clone()),
    );

    assert_eq!(
        poller.poll_once().await.unwrap(),
        PollOutcome::Unchanged { id: "A".into() }
    );
    assert_eq!(sink.send_call_count(), 0);
}

#[tokio::test]
async fn state_is_written_before_the_sink_is_called() {
    struct StateCheckingSink {
        store: MemoryKvStore,
        seen: std::sync::Mutex<Vec<Option<serde_json::Value>>>,
    }

    #[async_trait::async_trait]
    impl NotificationSink for StateCheckingSink {
        async fn send(&self, _channel: &str, _text: &str) -> Result<()> {
            let state = self.store.get("notifications/uploads/lastSeenId").await?;
            self.seen.lock().unwrap().push(state);
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "state-checking"
        }
    }

    let store = MemoryKvStore::new();
    let sink = Arc::new(StateCheckingSink {
        store: store.clone(),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let poller = poller_over(
        vec![Box::new(ScriptedFeedSource::items("primary", &["A"]))],
        Arc::new(store),
        sink.clone(),
    );

    poller.poll_once().await.unwrap();

    assert_eq!(*sink.seen.lock().unwrap(), vec![Some(json!("A"))]);
}

#[tokio::test]
async fn sink_failure_still_records_the_item() {
    let store = MemoryKvStore::new();
    let sink = RecordingSink::failing();
    let poller = poller_over(
        vec![Box::new(ScriptedFeedSource::items("primary", &["A", "A"]))],
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
    );

    let first = poller.poll_once().await.unwrap();
    assert!(matches!(first, PollOutcome::Notified { delivered: false, .. }));

    // The lost announcement is not retried
    let second = poller.poll_once().await.unwrap();
    assert!(matches!(second, PollOutcome::Unchanged { .. }));
    assert_eq!(sink.send_call_count(), 1);
}

#[tokio::test]
async fn switching_sources_does_not_reannounce() {
    let sink = RecordingSink::new();
    let primary = ScriptedFeedSource::new(
        "primary",
        vec![
            Ok(item("A")),
            Err(Error::source_fetch("primary", "quota exceeded")),
            Ok(item("A")),
        ],
    );
    let fallback = ScriptedFeedSource::items("fallback", &["A"]);
    let fallback_calls = fallback.fetch_counter();

    let poller = poller_over(
        vec![Box::new(primary), Box::new(fallback)],
        Arc::new(MemoryKvStore::new()),
        Arc::new(sink.clone()),
    );

    assert!(matches!(
        poller.poll_once().await.unwrap(),
        PollOutcome::Notified { .. }
    ));
    assert_eq!(
        poller.poll_once().await.unwrap(),
        PollOutcome::Unchanged { id: "A".into() }
    );
    assert_eq!(
        poller.poll_once().await.unwrap(),
        PollOutcome::Unchanged { id: "A".into() }
    );

    assert_eq!(sink.send_call_count(), 1);
    assert_eq!(
        fallback_calls.load(Ordering::SeqCst),
        1,
        "Fallback should only be asked when the primary fails"
    );
}

#[tokio::test]
async fn empty_primary_falls_through_to_fallback() {
    let sink = RecordingSink::new();
    let store = MemoryKvStore::new();
    let primary = ScriptedFeedSource::new("primary", vec![Ok(FetchOutcome::Empty)]);
    let fallback = ScriptedFeedSource::items("fallback", &["A"]);
    let fallback_calls = fallback.fetch_counter();

    let poller = poller_over(
        vec![Box::new(primary), Box::new(fallback)],
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
    );

    match poller.poll_once().await.unwrap() {
        PollOutcome::Notified { item, source, .. } => {
            assert_eq!(item.id, "A");
            assert_eq!(source, "fallback");
        }
        other => panic!("Expected the fallback item to be announced, got {:?}", other),
    }
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get("notifications/uploads/lastSeenId").await.unwrap(),
        Some(json!("A"))
    );
    assert_eq!(sink.send_call_count(), 1);
}

#[tokio::test]
async fn store_failure_aborts_the_cycle() {
    let sink = RecordingSink::new();
    let poller = poller_over(
        vec![Box::new(ScriptedFeedSource::items("primary", &["A"]))],
        Arc::new(FailingStore),
        Arc::new(sink.clone()),
    );

    let err = poller.poll_once().await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert_eq!(sink.send_call_count(), 0);
}

#[tokio::test]
async fn feeds_keep_independent_state() {
    let store = MemoryKvStore::new();
    let sink = RecordingSink::new();
    let paths = StorePaths::default();

    let first = ChangePoller::new(
        &FeedConfig::new("first", "c1"),
        vec![Box::new(ScriptedFeedSource::items("primary", &["A"]))],
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        &paths,
    );
    let second = ChangePoller::new(
        &FeedConfig::new("second", "c2"),
        vec![Box::new(ScriptedFeedSource::items("primary", &["A"]))],
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        &paths,
    );

    first.poll_once().await.unwrap();
    second.poll_once().await.unwrap();

    assert_eq!(sink.send_call_count(), 2);
    assert_eq!(second.state_path(), "notifications/second/lastSeenId");
    assert_eq!(
        sink.messages().iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
        vec!["c1", "c2"]
    );
}
