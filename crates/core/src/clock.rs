//! Time sources.
//!
//! Wall-clock reads are injected rather than taken from `Utc::now()` inline,
//! so that timer and session behaviour can be exercised against a controlled
//! clock in tests.

use chrono::{DateTime, Utc};

/// A source of the current UTC time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The process wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A hand-driven clock for tests. Cloning shares the underlying instant.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    instant: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            instant: std::sync::Arc::new(std::sync::Mutex::new(instant)),
        }
    }

    pub(crate) fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.instant.lock().expect("manual clock mutex poisoned");
        *guard += duration;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("manual clock mutex poisoned")
    }
}
