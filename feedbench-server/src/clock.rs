//! Time source for every `created_at` value written by the store.
//!
//! Repositories never read the wall clock directly; they ask the injected
//! [`Clock`]. Production wiring uses [`SystemClock`], tests use [`StubClock`].

use std::sync::RwLock;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync + 'static {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real-time clock.
///
/// Truncated to microseconds, the precision of `TIMESTAMPTZ`, so a value
/// handed to Postgres comes back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Settable clock for deterministic tests.
#[derive(Debug)]
pub struct StubClock {
    now: RwLock<DateTime<Utc>>,
}

impl StubClock {
    /// Create a stub pinned to the current (truncated) time.
    pub fn new() -> Self {
        Self::at(SystemClock.now_utc())
    }

    /// Create a stub pinned to `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now.trunc_subsecs(6)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = now.trunc_subsecs(6);
    }

    /// Move the clock forward and return the new time.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard = (*guard + by).trunc_subsecs(6);
        *guard
    }
}

impl Default for StubClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StubClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
