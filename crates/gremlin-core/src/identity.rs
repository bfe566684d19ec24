//! Ban target normalization
//!
//! A raw target is either a device token (starts with [`DEVICE_PREFIX`]) or a
//! network address. Device tokens are already storage-safe; addresses have
//! their dots replaced because dots are not valid in store path segments.
//! Lookups always re-normalize the raw input, so no inverse exists.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that marks a raw target as a device token
pub const DEVICE_PREFIX: &str = "dev_";

/// Kind of ban target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanCategory {
    /// Network address ban
    Address,
    /// Device token ban
    Device,
}

impl fmt::Display for BanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanCategory::Address => f.write_str("address"),
            BanCategory::Device => f.write_str("device"),
        }
    }
}

/// Canonical, storage-safe identity of a ban target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    /// Kind of target
    pub category: BanCategory,
    /// Key used as the final store path segment
    pub key: String,
}

/// Normalize a raw ban target
///
/// ```
/// use gremlin_core::identity::{normalize, BanCategory};
///
/// let address = normalize("1.2.3.4");
/// assert_eq!(address.category, BanCategory::Address);
/// assert_eq!(address.key, "1_2_3_4");
///
/// let device = normalize("dev_abc");
/// assert_eq!(device.category, BanCategory::Device);
/// assert_eq!(device.key, "dev_abc");
/// ```
pub fn normalize(raw: &str) -> CanonicalKey {
    if raw.starts_with(DEVICE_PREFIX) {
        CanonicalKey {
            category: BanCategory::Device,
            key: raw.to_string(),
        }
    } else {
        CanonicalKey {
            category: BanCategory::Address,
            key: raw.replace('.', "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_address() {
        let key = normalize("192.168.0.10");
        assert_eq!(key.category, BanCategory::Address);
        assert_eq!(key.key, "192_168_0_10");
    }

    #[test]
    fn test_ipv6_address_keeps_colons() {
        let key = normalize("2001:db8::1");
        assert_eq!(key.category, BanCategory::Address);
        assert_eq!(key.key, "2001:db8::1");
    }

    #[test]
    fn test_device_token_unchanged() {
        let key = normalize("dev_9f.a1");
        assert_eq!(key.category, BanCategory::Device);
        assert_eq!(key.key, "dev_9f.a1");
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert_eq!(normalize("DEV_abc").category, BanCategory::Address);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(normalize("10.0.0.1"), normalize("10.0.0.1"));
    }
}
