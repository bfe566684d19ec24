//! Giveaway entry registry
//!
//! One entry per actor, keyed by actor id. The existence check and the write
//! are two separate store calls; concurrent joins by the same actor are not
//! serialized.

use crate::config::StorePaths;
use crate::error::{Error, Result};
use crate::store::{get_json, join_path, set_json};
use crate::traits::{Clock, KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A giveaway entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveawayEntry {
    /// Actor id (unique key)
    #[serde(rename = "id")]
    pub actor_id: String,
    /// Name printed on the ticket
    #[serde(rename = "username")]
    pub display_name: String,
    /// Avatar reference, if the front end supplied one
    #[serde(rename = "avatar", default)]
    pub avatar_ref: Option<String>,
    /// When the actor joined
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
}

/// Join/clear over the key-value store
#[derive(Clone)]
pub struct EntryRegistry {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    root: String,
}

impl EntryRegistry {
    /// Create a new entry registry
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, paths: &StorePaths) -> Self {
        Self {
            store,
            clock,
            root: paths.giveaway_entries.clone(),
        }
    }

    /// Enter an actor once
    ///
    /// # Returns
    ///
    /// - `Ok(GiveawayEntry)`: The new entry
    /// - `Err(Error::AlreadyJoined)`: The actor already has an entry
    /// - `Err(Error::Store)`: Store failure
    pub async fn join(&self, actor_id: &str, display_name: &str) -> Result<GiveawayEntry> {
        self.join_with_avatar(actor_id, display_name, None).await
    }

    /// Enter an actor once, recording an avatar reference
    pub async fn join_with_avatar(
        &self,
        actor_id: &str,
        display_name: &str,
        avatar_ref: Option<&str>,
    ) -> Result<GiveawayEntry> {
        if actor_id.is_empty() || actor_id.contains(['/', '.', '#', '$', '[', ']']) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a valid actor id",
                actor_id
            )));
        }

        let path = join_path(&[&self.root, actor_id]);

        if self.store.get(&path).await?.is_some() {
            return Err(Error::AlreadyJoined(actor_id.to_string()));
        }

        let entry = GiveawayEntry {
            actor_id: actor_id.to_string(),
            display_name: display_name.to_string(),
            avatar_ref: avatar_ref.map(str::to_string),
            joined_at: self.clock.now(),
        };
        set_json(self.store.as_ref(), &path, &entry).await?;

        info!("Giveaway entry added for {} as {}", actor_id, display_name);
        Ok(entry)
    }

    /// Read an actor's entry
    pub async fn get(&self, actor_id: &str) -> Result<Option<GiveawayEntry>> {
        let path = join_path(&[&self.root, actor_id]);
        get_json(self.store.as_ref(), &path).await
    }

    /// Remove every entry
    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&self.root).await?;
        info!("Giveaway entries cleared");
        Ok(())
    }
}
