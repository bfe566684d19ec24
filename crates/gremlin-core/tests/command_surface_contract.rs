//! Contract Test: Command Surface
//!
//! This test verifies that chat commands reach the registries and that every
//! outcome, including failures, becomes a reply.
//!
//! Constraints verified:
//! - Privileged commands are refused for ordinary members
//! - `join` is open to everyone
//! - `ban` without a duration lasts one hour unless configured otherwise
//! - Registry errors are reported, never propagated
//! - Non-commands produce no reply

mod common;

use common::*;
use gremlin_core::commands::{Caller, CommandRouter};
use gremlin_core::config::{CommandConfig, StorePaths};
use gremlin_core::traits::{Clock, KvStore};
use gremlin_core::{BanRegistry, EntryRegistry, PresenceDirectory, SystemClock};
use serde_json::json;
use std::sync::Arc;

fn member(id: &str, username: &str) -> Caller {
    Caller {
        id: id.to_string(),
        tag: format!("{}#0001", username),
        username: username.to_string(),
        avatar: Some(format!("https://cdn.example/{}.png", id)),
        privileged: false,
    }
}

fn moderator() -> Caller {
    Caller {
        privileged: true,
        ..member("m1", "moderator")
    }
}

fn router(fixture: &Fixture, config: CommandConfig) -> CommandRouter {
    CommandRouter::new(
        fixture.bans.clone(),
        fixture.entries.clone(),
        fixture.presence.clone(),
        config,
    )
}

#[tokio::test]
async fn moderator_can_ban_and_unban() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    let reply = router
        .dispatch(&moderator(), "!ban 1.2.3.4 1h yes")
        .await
        .unwrap();
    assert_eq!(reply, "✅ Banned **1.2.3.4** for 1h (SCARED)");

    let stored = fixture.store.get("bans/address/1_2_3_4").await.unwrap().unwrap();
    assert_eq!(stored["banned_by"], json!("moderator#0001"));
    assert_eq!(stored["is_scared"], json!(true));

    let reply = router.dispatch(&moderator(), "!unban 1.2.3.4").await.unwrap();
    assert_eq!(reply, "✅ Unbanned **1.2.3.4**");
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn members_are_refused_privileged_commands() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());
    let alice = member("u1", "alice");

    for text in [
        "!ban 1.2.3.4 1h",
        "!unban 1.2.3.4",
        "!users",
        "!clear_giveaway",
    ] {
        let reply = router.dispatch(&alice, text).await.unwrap();
        assert!(reply.contains("ACCESS DENIED"), "{} -> {}", text, reply);
    }
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn bad_duration_is_echoed_to_the_caller() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    let reply = router.dispatch(&moderator(), "!ban 1.2.3.4 soon").await.unwrap();
    assert!(reply.starts_with("Error: Invalid duration"), "{}", reply);
    assert!(reply.contains("'soon'"));
}

#[tokio::test]
async fn missing_duration_bans_for_one_hour() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    let reply = router.dispatch(&moderator(), "!ban dev_a").await.unwrap();
    assert_eq!(reply, "✅ Banned **dev_a** for 1h");

    let expected = (fixture.clock.now() + chrono::TimeDelta::hours(1)).timestamp_millis();
    assert_eq!(
        fixture.store.get("bans/device/dev_a/expires_at").await.unwrap(),
        Some(json!(expected))
    );
}

#[tokio::test]
async fn missing_duration_follows_configured_default() {
    let fixture = Fixture::new();

    let timed = router(
        &fixture,
        CommandConfig {
            default_ban_duration: Some("2d".to_string()),
            ..CommandConfig::default()
        },
    );
    let reply = timed.dispatch(&moderator(), "!ban dev_b").await.unwrap();
    assert_eq!(reply, "✅ Banned **dev_b** for 2d");

    let permanent = router(
        &fixture,
        CommandConfig {
            default_ban_duration: None,
            ..CommandConfig::default()
        },
    );
    let reply = permanent.dispatch(&moderator(), "!ban dev_c").await.unwrap();
    assert_eq!(reply, "✅ Banned **dev_c** permanently");
    assert_eq!(
        fixture.store.get("bans/device/dev_c/expires_at").await.unwrap(),
        Some(json!(-1))
    );
}

#[tokio::test]
async fn join_uses_given_name_or_username() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    let reply = router
        .dispatch(&member("u1", "alice"), "!join Lucky Alice")
        .await
        .unwrap();
    assert_eq!(reply, "🎟️ **Entry Confirmed!** Ticket Name: **Lucky Alice**");

    let reply = router.dispatch(&member("u2", "bob"), "!join").await.unwrap();
    assert!(reply.contains("**bob**"));

    let entry = fixture.entries.get("u1").await.unwrap().unwrap();
    assert_eq!(entry.avatar_ref.as_deref(), Some("https://cdn.example/u1.png"));

    let reply = router
        .dispatch(&member("u1", "alice"), "!join Again")
        .await
        .unwrap();
    assert!(reply.contains("already joined"));
}

#[tokio::test]
async fn moderator_can_clear_entries() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    router.dispatch(&member("u1", "alice"), "!join").await.unwrap();
    let reply = router.dispatch(&moderator(), "!clearEntries").await.unwrap();
    assert_eq!(reply, "🗑️ **Giveaway entries cleared.**");
    assert_eq!(fixture.entries.get("u1").await.unwrap(), None);
}

#[tokio::test]
async fn online_listing_is_redacted() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    let reply = router.dispatch(&moderator(), "!online").await.unwrap();
    assert_eq!(reply, "No users online.");

    fixture
        .store
        .set(
            "online_users/s1",
            json!({ "name": "Secret Name", "location": "Lisbon", "deviceId": "dev_1", "isp": "NetCo" }),
        )
        .await
        .unwrap();

    let reply = router.dispatch(&moderator(), "!listOnline").await.unwrap();
    assert!(reply.contains("Lisbon"));
    assert!(reply.contains("dev_1"));
    assert!(!reply.contains("Secret Name"));
}

#[tokio::test]
async fn store_errors_become_replies() {
    let store: Arc<dyn KvStore> = Arc::new(FailingStore);
    let paths = StorePaths::default();
    let router = CommandRouter::new(
        BanRegistry::new(store.clone(), Arc::new(SystemClock::new()), &paths),
        EntryRegistry::new(store.clone(), Arc::new(SystemClock::new()), &paths),
        PresenceDirectory::new(store, &paths),
        CommandConfig::default(),
    );

    let reply = router.dispatch(&moderator(), "!ban 1.2.3.4 1h").await.unwrap();
    assert!(reply.starts_with("Error: Store error"), "{}", reply);

    let reply = router.dispatch(&moderator(), "!users").await.unwrap();
    assert!(reply.starts_with("Error fetching users"));

    let reply = router.dispatch(&member("u1", "a"), "!join").await.unwrap();
    assert!(reply.starts_with("Error joining giveaway"));
}

#[tokio::test]
async fn ordinary_chat_is_ignored() {
    let fixture = Fixture::new();
    let router = router(&fixture, CommandConfig::default());

    assert_eq!(router.dispatch(&moderator(), "hello there").await, None);
    assert_eq!(router.dispatch(&moderator(), "!unknown").await, None);

    let usage = router.dispatch(&moderator(), "!unban").await.unwrap();
    assert!(usage.starts_with("Usage:"));
}
