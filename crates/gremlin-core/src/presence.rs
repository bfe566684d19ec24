//! Online-user listing
//!
//! Reads the presence collection maintained by the platform and renders it
//! for a chat reply. Display names are never printed.

use crate::config::StorePaths;
use crate::error::Result;
use crate::traits::KvStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Longest reply the chat surface accepts
pub const REPLY_LIMIT: usize = 2000;

/// Length a too-long reply is cut back to before the truncation marker
pub const TRUNCATE_TO: usize = 1900;

/// One online user as published by the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OnlineUser {
    /// Coarse location
    #[serde(default)]
    pub location: Option<String>,
    /// Device token
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
    /// Network provider
    #[serde(default)]
    pub isp: Option<String>,
}

/// Read access to the presence collection
#[derive(Clone)]
pub struct PresenceDirectory {
    store: Arc<dyn KvStore>,
    root: String,
}

impl PresenceDirectory {
    /// Create a new presence directory
    pub fn new(store: Arc<dyn KvStore>, paths: &StorePaths) -> Self {
        Self {
            store,
            root: paths.online_users.clone(),
        }
    }

    /// Every online user, in key order; unreadable children are skipped
    pub async fn online_users(&self) -> Result<Vec<OnlineUser>> {
        let Some(value) = self.store.get(&self.root).await? else {
            return Ok(Vec::new());
        };
        let Some(children) = value.as_object() else {
            debug!("Presence collection {} is not an object", self.root);
            return Ok(Vec::new());
        };

        let mut keys: Vec<&String> = children.keys().collect();
        keys.sort();

        let users = keys
            .into_iter()
            .filter_map(|key| {
                match serde_json::from_value::<OnlineUser>(children[key.as_str()].clone()) {
                    Ok(user) => Some(user),
                    Err(e) => {
                        debug!("Skipping unreadable presence entry {}: {}", key, e);
                        None
                    }
                }
            })
            .collect();

        Ok(users)
    }
}

/// Render the online-user reply, truncated to fit the chat surface
pub fn format_online_users(users: &[OnlineUser]) -> String {
    if users.is_empty() {
        return "No users online.".to_string();
    }

    let mut reply = format!("**Online Users ({}):**\n", users.len());
    for user in users {
        reply.push_str(&format!(
            "🖥️ **REDACTED** ({})\nID: `{}`\nISP: {}\n\n",
            user.location.as_deref().unwrap_or("unknown"),
            user.device_id.as_deref().unwrap_or("unknown"),
            user.isp.as_deref().unwrap_or("unknown"),
        ));
    }

    truncate_reply(&reply)
}

/// Cut a reply longer than [`REPLY_LIMIT`] characters back to
/// [`TRUNCATE_TO`] characters plus a marker
pub fn truncate_reply(reply: &str) -> String {
    if reply.chars().count() <= REPLY_LIMIT {
        return reply.to_string();
    }
    let cut: String = reply.chars().take(TRUNCATE_TO).collect();
    format!("{}... (truncated)", cut)
}
