//! Compact duration tokens and ban expiry
//!
//! A token is an unsigned magnitude followed by exactly one unit code:
//!
//! | code | unit    | seconds    |
//! |------|---------|------------|
//! | `s`  | second  | 1          |
//! | `m`  | minute  | 60         |
//! | `h`  | hour    | 3 600      |
//! | `d`  | day     | 86 400     |
//! | `w`  | week    | 604 800    |
//! | `mo` | month   | 2 592 000  |
//! | `y`  | year    | 31 536 000 |
//!
//! Months are 30 days and years 365 days; there is no calendar or timezone
//! arithmetic. An absent token means the ban never expires.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// Unit of a duration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    /// Parse a unit code (`s`, `m`, `h`, `d`, `w`, `mo`, `y`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Self::Seconds),
            "m" => Some(Self::Minutes),
            "h" => Some(Self::Hours),
            "d" => Some(Self::Days),
            "w" => Some(Self::Weeks),
            "mo" => Some(Self::Months),
            "y" => Some(Self::Years),
            _ => None,
        }
    }

    /// The unit code as written in a token
    pub fn code(&self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
            Self::Months => "mo",
            Self::Years => "y",
        }
    }

    /// Length of one unit in seconds
    pub fn seconds(&self) -> i64 {
        const DAY: i64 = 24 * 60 * 60;
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => DAY,
            Self::Weeks => 7 * DAY,
            Self::Months => 30 * DAY,
            Self::Years => 365 * DAY,
        }
    }
}

/// A parsed duration token such as `10m` or `2mo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationToken {
    /// Number of units
    pub magnitude: u64,
    /// Unit
    pub unit: DurationUnit,
}

impl DurationToken {
    /// Length of the token as a time delta
    ///
    /// Fails when the magnitude is too large to represent.
    pub fn as_delta(&self) -> Result<TimeDelta> {
        i64::try_from(self.magnitude)
            .ok()
            .and_then(|m| m.checked_mul(self.unit.seconds()))
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| Error::invalid_duration(format!("'{}' is too long", self)))
    }

    /// Instant at which a ban issued at `now` with this duration lapses
    pub fn expires_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let delta = self.as_delta()?;
        now.checked_add_signed(delta)
            .ok_or_else(|| Error::invalid_duration(format!("'{}' is too long", self)))
    }

    /// Whether the token describes an empty span (e.g. `0h`)
    pub fn is_zero(&self) -> bool {
        self.magnitude == 0
    }
}

impl FromStr for DurationToken {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        let invalid = || {
            Error::invalid_duration(format!(
                "'{}' is not a valid duration. Use a number followed by s, m, h, d, w, mo or y (e.g. 10s, 5m, 1h, 1d)",
                token
            ))
        };

        let split = token
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (digits, code) = token.split_at(split);
        if digits.is_empty() {
            return Err(invalid());
        }

        let unit = DurationUnit::from_code(code).ok_or_else(invalid)?;
        let magnitude = digits.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self { magnitude, unit })
    }
}

impl fmt::Display for DurationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.code())
    }
}

/// When a ban lapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The ban never lapses
    Never,
    /// The ban lapses at this instant
    At(DateTime<Utc>),
}

impl Expiry {
    /// Whether the ban has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now,
        }
    }

    /// The expiry instant, if any
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(*at),
        }
    }
}

/// Turn an optional duration token into an expiry, using one `now` snapshot
///
/// # Returns
///
/// - `Ok(Expiry::Never)`: `token` is `None`
/// - `Ok(Expiry::At(now + Δ))`: `token` matches the grammar
/// - `Err(Error::InvalidDuration)`: `token` does not match the grammar
pub fn parse_expiry(token: Option<&str>, now: DateTime<Utc>) -> Result<Expiry> {
    match token {
        None => Ok(Expiry::Never),
        Some(token) => {
            let token: DurationToken = token.parse()?;
            Ok(Expiry::At(token.expires_from(now)?))
        }
    }
}

/// Serde adapter storing an [`Expiry`] as epoch milliseconds, `-1` for never
pub mod expiry_millis {
    use super::Expiry;
    use chrono::DateTime;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Stored value meaning "never expires"
    pub const NEVER: i64 = -1;

    pub fn serialize<S: Serializer>(expiry: &Expiry, serializer: S) -> Result<S::Ok, S::Error> {
        match expiry {
            Expiry::Never => serializer.serialize_i64(NEVER),
            Expiry::At(at) => serializer.serialize_i64(at.timestamp_millis()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Expiry, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            None => Ok(Expiry::Never),
            Some(ms) if ms < 0 => Ok(Expiry::Never),
            Some(ms) => DateTime::from_timestamp_millis(ms)
                .map(Expiry::At)
                .ok_or_else(|| D::Error::custom(format!("expiry out of range: {}", ms))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_every_unit() {
        let cases = [
            ("10s", 10),
            ("5m", 5 * 60),
            ("1h", 3600),
            ("2d", 2 * 86_400),
            ("1w", 604_800),
            ("1mo", 30 * 86_400),
            ("1y", 365 * 86_400),
        ];

        for (token, secs) in cases {
            let expiry = parse_expiry(Some(token), now()).unwrap();
            assert_eq!(
                expiry,
                Expiry::At(now() + TimeDelta::seconds(secs)),
                "token {}",
                token
            );
        }
    }

    #[test]
    fn test_absent_token_is_permanent() {
        assert_eq!(parse_expiry(None, now()).unwrap(), Expiry::Never);
    }

    #[test]
    fn test_invalid_tokens() {
        for token in [
            "", "h", "10", "1.5h", "-1h", "1 h", " 1h", "1h ", "1H", "1hr", "1ms", "mo1", "1m0",
            "１h",
        ] {
            let err = parse_expiry(Some(token), now()).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDuration(_)),
                "token {:?} gave {:?}",
                token,
                err
            );
        }
    }

    #[test]
    fn test_minutes_and_months_are_distinct() {
        let m: DurationToken = "3m".parse().unwrap();
        let mo: DurationToken = "3mo".parse().unwrap();
        assert_eq!(m.unit, DurationUnit::Minutes);
        assert_eq!(mo.unit, DurationUnit::Months);
        assert_eq!(mo.to_string(), "3mo");
    }

    #[test]
    fn test_overflowing_magnitude() {
        let err = parse_expiry(Some("99999999999999999999y"), now()).unwrap_err();
        assert!(matches!(err, Error::InvalidDuration(_)));

        let err = parse_expiry(Some("9000000000000000y"), now()).unwrap_err();
        assert!(matches!(err, Error::InvalidDuration(_)));
    }

    #[test]
    fn test_zero_magnitude_parses() {
        let token: DurationToken = "0s".parse().unwrap();
        assert!(token.is_zero());
        assert_eq!(token.expires_from(now()).unwrap(), now());
    }

    #[test]
    fn test_expiry_is_expired() {
        assert!(!Expiry::Never.is_expired(now()));
        assert!(Expiry::At(now()).is_expired(now()));
        assert!(!Expiry::At(now() + TimeDelta::seconds(1)).is_expired(now()));
    }

    #[test]
    fn test_expiry_millis_wire_format() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "expiry_millis")]
            expires_at: Expiry,
        }

        let json = serde_json::to_value(Wrapper {
            expires_at: Expiry::Never,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "expires_at": -1 }));

        let back: Wrapper =
            serde_json::from_value(serde_json::json!({ "expires_at": 1_700_000_000_000i64 }))
                .unwrap();
        assert_eq!(back.expires_at, Expiry::At(now()));

        let null: Wrapper = serde_json::from_value(serde_json::json!({ "expires_at": null })).unwrap();
        assert_eq!(null.expires_at, Expiry::Never);
    }
}
