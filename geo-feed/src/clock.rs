//! Clock collaborator.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Injected so that the time-windowed views and the pushed-since cutoff are
/// testable with a fixed instant.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
