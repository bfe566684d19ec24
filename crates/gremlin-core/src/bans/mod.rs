//! Time-bound ban registry
//!
//! Stores and removes ban records in the external store. A record's presence
//! is the ban; there is no separate "active" flag and this registry never
//! purges lapsed records. Whoever consumes a record (for example the platform
//! at connection time) compares [`BanRecord::expires`] against its own clock.
//!
//! ## Layout
//!
//! ```text
//! <address_bans>/<canonical key>   e.g. bans/address/1_2_3_4
//! <device_bans>/<device token>     e.g. bans/device/dev_abc
//! ```
//!
//! ## Stored Format
//!
//! ```json
//! {
//!   "banned_at": 1700000000000,
//!   "expires_at": 1700003600000,
//!   "banned_by": "moderator#0001",
//!   "is_scared": false
//! }
//! ```
//!
//! `expires_at` is `-1` for a permanent ban.

use crate::config::StorePaths;
use crate::duration::{DurationToken, Expiry, expiry_millis};
use crate::error::{Error, Result};
use crate::identity::{BanCategory, CanonicalKey, normalize};
use crate::store::{get_json, join_path, set_json};
use crate::traits::{Clock, KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A single suppressed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    /// Kind of target
    pub category: BanCategory,
    /// Canonical key the record is stored under
    pub key: String,
    /// When the ban was issued
    pub created_at: DateTime<Utc>,
    /// When the ban lapses
    pub expires: Expiry,
    /// Display string of the issuing actor
    pub issued_by: String,
    /// Auxiliary deterrence flag, passed through untouched
    pub flagged: bool,
}

impl BanRecord {
    /// Whether the ban has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_expired(now)
    }

    fn from_stored(key: CanonicalKey, stored: StoredBan) -> Self {
        Self {
            category: key.category,
            key: key.key,
            created_at: stored.banned_at,
            expires: stored.expires_at,
            issued_by: stored.banned_by,
            flagged: stored.is_scared,
        }
    }

    fn to_stored(&self) -> StoredBan {
        StoredBan {
            banned_at: self.created_at,
            expires_at: self.expires,
            banned_by: self.issued_by.clone(),
            is_scared: self.flagged,
        }
    }
}

/// Wire format shared with the rest of the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBan {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    banned_at: DateTime<Utc>,
    #[serde(with = "expiry_millis")]
    expires_at: Expiry,
    #[serde(default)]
    banned_by: String,
    #[serde(default)]
    is_scared: bool,
}

/// Ban CRUD over the key-value store
#[derive(Clone)]
pub struct BanRegistry {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    address_root: String,
    device_root: String,
}

impl BanRegistry {
    /// Create a new ban registry
    ///
    /// # Parameters
    ///
    /// - `store`: Store that owns the ban records
    /// - `clock`: Clock used to stamp and expire records
    /// - `paths`: Store namespaces (only the two ban roots are used)
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, paths: &StorePaths) -> Self {
        Self {
            store,
            clock,
            address_root: paths.address_bans.clone(),
            device_root: paths.device_bans.clone(),
        }
    }

    /// Store path of the record for a canonical key
    pub fn path_for(&self, key: &CanonicalKey) -> String {
        let root = match key.category {
            BanCategory::Address => &self.address_root,
            BanCategory::Device => &self.device_root,
        };
        join_path(&[root, &key.key])
    }

    /// Ban a target, overwriting any existing ban (re-banning resets the clock)
    ///
    /// # Parameters
    ///
    /// - `raw`: Address or device token as typed by the caller
    /// - `duration`: Duration token (`None` = permanent)
    /// - `flagged`: Auxiliary deterrence flag
    /// - `issued_by`: Display string of the issuing actor
    ///
    /// # Returns
    ///
    /// - `Ok(BanRecord)`: The record that was written
    /// - `Err(Error::InvalidInput)`: Empty target or one that is not a valid path segment
    /// - `Err(Error::InvalidDuration)`: Malformed, zero-length or overlong duration
    /// - `Err(Error::Store)`: The write failed (not retried)
    pub async fn ban(
        &self,
        raw: &str,
        duration: Option<&str>,
        flagged: bool,
        issued_by: &str,
    ) -> Result<BanRecord> {
        let key = checked_key(raw)?;

        let now = self.clock.now();
        let expires = match duration {
            None => Expiry::Never,
            Some(token) => {
                let token: DurationToken = token.parse()?;
                if token.is_zero() {
                    return Err(Error::invalid_duration(format!(
                        "'{}' is zero-length; a ban must last at least one second",
                        token
                    )));
                }
                Expiry::At(token.expires_from(now)?)
            }
        };

        let path = self.path_for(&key);
        let record = BanRecord {
            category: key.category,
            key: key.key,
            created_at: now,
            expires,
            issued_by: issued_by.to_string(),
            flagged,
        };

        set_json(self.store.as_ref(), &path, &record.to_stored()).await?;

        info!(
            "Banned {} {} until {} (issued by {}, flagged: {})",
            record.category,
            record.key,
            record
                .expires
                .instant()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "forever".to_string()),
            record.issued_by,
            record.flagged
        );

        Ok(record)
    }

    /// Remove the ban for a target
    ///
    /// Removing a target that is not banned succeeds.
    pub async fn unban(&self, raw: &str) -> Result<()> {
        let key = checked_key(raw)?;
        let path = self.path_for(&key);
        self.store.delete(&path).await?;
        info!("Unbanned {} {}", key.category, key.key);
        Ok(())
    }

    /// Read back the ban for a target, if any
    ///
    /// Expired records are returned as-is; check [`BanRecord::is_expired`].
    pub async fn lookup(&self, raw: &str) -> Result<Option<BanRecord>> {
        let key = checked_key(raw)?;
        let path = self.path_for(&key);
        let stored: Option<StoredBan> = get_json(self.store.as_ref(), &path).await?;
        Ok(stored.map(|s| BanRecord::from_stored(key, s)))
    }
}

/// Normalize `raw`, rejecting targets that cannot be a single path segment
fn checked_key(raw: &str) -> Result<CanonicalKey> {
    if raw.is_empty() {
        return Err(Error::invalid_input("ban target cannot be empty"));
    }
    if raw
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '#' | '$' | '[' | ']'))
    {
        return Err(Error::invalid_input(format!(
            "'{}' is not a valid address or device token",
            raw
        )));
    }
    Ok(normalize(raw))
}
