// # Clock Trait
//
// Wall-clock access for components that compare timestamps (ban expiry,
// tail recency). Injected so tests can pin "now".

use chrono::{DateTime, Utc};

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    /// Current wall-clock instant
    fn now(&self) -> DateTime<Utc>;
}
