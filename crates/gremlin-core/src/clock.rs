//! Clock implementations.
//!
//! [`SystemClock`] is used in production. [`ManualClock`] lets tests pin and
//! advance time explicitly.

use crate::traits::Clock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// System clock implementation using `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// All clones share the same underlying instant, so advancing one clone
/// advances every component holding another.
///
/// ```
/// use gremlin_core::clock::ManualClock;
/// use gremlin_core::traits::Clock;
///
/// let start = chrono::Utc::now();
/// let clock = ManualClock::new(start);
/// clock.advance(chrono::Duration::seconds(5));
/// assert_eq!(clock.now(), start + chrono::Duration::seconds(5));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock pinned at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }

    /// Pin the clock at `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
