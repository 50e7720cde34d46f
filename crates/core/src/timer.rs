//! The consultation timer.
//!
//! The timer is a derived view over two nullable timestamps: it holds nothing
//! the owning record does not already carry. Elapsed time is always recomputed
//! from `(ended_at ?? now) - started_at` rather than accumulated, so the value
//! stays correct when a session is rebuilt from a persisted record.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock};

/// The cadence of the live tick while a consultation is running.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Computes whole elapsed seconds between a start timestamp and either the
/// end timestamp or `now`.
///
/// A missing start yields 0. A negative span (clock skew, corrupt data) is
/// clamped to 0 so callers always render `00:00` rather than a bogus value.
pub fn elapsed_seconds(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> u64 {
    let Some(start) = start else {
        return 0;
    };
    let until = end.unwrap_or(now);
    let span = until.signed_duration_since(start).num_seconds();
    u64::try_from(span).unwrap_or(0)
}

/// Renders elapsed seconds as `MM:SS`, switching to `HH:MM:SS` once the hour
/// boundary is crossed. All components are zero-padded to two digits.
pub fn format_elapsed(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Tracks elapsed time for one consultation and reports the start/stop
/// instants for the caller to persist.
///
/// State is re-derivable from the two timestamps supplied at construction;
/// the struct exists so the workflow controller has a single place to ask
/// "is the clock running and what should the display show".
#[derive(Debug, Clone)]
pub struct ConsultationTimer<C: Clock = SystemClock> {
    clock: C,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
    running: bool,
}

impl<C: Clock> ConsultationTimer<C> {
    /// Builds a timer from a record's timestamps.
    ///
    /// With a start and no end the timer resumes running and the elapsed
    /// value is recomputed against the clock; with both timestamps the timer
    /// is frozen at the recorded span; with neither it reads `00:00`.
    pub fn new(clock: C, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        let now = clock.now();
        let elapsed = elapsed_seconds(start, end, now);
        let running = start.is_some() && end.is_none();
        Self {
            clock,
            start,
            end,
            elapsed_seconds: elapsed,
            running,
        }
    }

    /// Starts the clock, returning the start instant to persist.
    ///
    /// Returns `None` without touching any state if a start timestamp already
    /// exists; the control is simply not offered twice.
    pub fn start(&mut self) -> Option<DateTime<Utc>> {
        if self.start.is_some() {
            return None;
        }
        let now = self.clock.now();
        self.start = Some(now);
        self.elapsed_seconds = 0;
        self.running = true;
        tracing::debug!(started_at = %now, "consultation timer started");
        Some(now)
    }

    /// Stops the clock, returning the end instant to persist.
    ///
    /// The end timestamp is set at most once: stopping an already-stopped or
    /// never-started timer returns `None` and changes nothing.
    pub fn stop(&mut self) -> Option<DateTime<Utc>> {
        if !self.running || self.end.is_some() {
            return None;
        }
        let now = self.clock.now();
        self.end = Some(now);
        self.running = false;
        tracing::debug!(ended_at = %now, "consultation timer stopped");
        Some(now)
    }

    /// Advances the display by one second if the clock is running.
    ///
    /// Returns whether the timer is still running, so a driving loop knows
    /// when to stand down.
    pub fn tick(&mut self) -> bool {
        if self.running {
            self.elapsed_seconds += 1;
        }
        self.running
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// The current display string (`MM:SS` or `HH:MM:SS`).
    pub fn display(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }
}

/// Cancels the associated tick task when dropped.
///
/// Holding the guard is what keeps the tick alive; dropping it (navigating
/// away, tearing the session down) aborts the task so no tick can fire
/// against a disposed timer.
#[derive(Debug)]
pub struct TickerGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl TickerGuard {
    /// Explicitly cancels the tick task.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns the once-per-second tick that drives a shared timer.
///
/// The task stands down on its own when the timer reports it is no longer
/// running; dropping the returned guard cancels it immediately.
pub fn spawn_ticker<C: Clock>(timer: Arc<Mutex<ConsultationTimer<C>>>) -> TickerGuard {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let still_running = {
                let Ok(mut timer) = timer.lock() else {
                    break;
                };
                timer.tick()
            };
            if !still_running {
                break;
            }
        }
    });
    TickerGuard { handle }
}
