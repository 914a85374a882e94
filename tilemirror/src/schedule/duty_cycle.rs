//! Duty-cycle throttle.
//!
//! Fetching is allowed for `active` seconds, then paused for `idle` seconds,
//! repeating from the session start:
//!
//! ```text
//! |<-- active -->|<- idle ->|<-- active -->|<- idle ->| ...
//! 0              A         A+I           2A+I       2A+2I
//! ```
//!
//! This is a coarse bandwidth cap, independent of worker concurrency.

use std::time::Duration;

use tracing::debug;

use super::ScheduleError;
use crate::clock::Clock;

/// Longest single sleep while waiting out an idle window.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default active window in seconds.
pub const DEFAULT_ACTIVE_WINDOW_SECS: u64 = 120;

/// Default idle window in seconds.
pub const DEFAULT_IDLE_WINDOW_SECS: u64 = 30;

/// Alternating active/idle windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    active: Duration,
    idle: Duration,
}

impl DutyCycle {
    /// Creates a duty cycle. A zero `idle` window disables throttling.
    pub fn new(active: Duration, idle: Duration) -> Result<Self, ScheduleError> {
        if active.is_zero() {
            return Err(ScheduleError::ZeroActiveWindow);
        }
        Ok(Self { active, idle })
    }

    /// A duty cycle that never pauses.
    pub fn unlimited() -> Self {
        Self {
            active: Duration::MAX,
            idle: Duration::ZERO,
        }
    }

    pub fn active(&self) -> Duration {
        self.active
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    /// Returns true if fetching is permitted `elapsed` after session start.
    pub fn is_active(&self, elapsed: Duration) -> bool {
        self.idle_remaining(elapsed).is_none()
    }

    /// Time left in the current idle window, or `None` while active.
    pub fn idle_remaining(&self, elapsed: Duration) -> Option<Duration> {
        if self.idle.is_zero() {
            return None;
        }

        let period = self.active.as_nanos() + self.idle.as_nanos();
        let phase = elapsed.as_nanos() % period;
        if phase < self.active.as_nanos() {
            None
        } else {
            let remaining = u64::try_from(period - phase).unwrap_or(u64::MAX);
            Some(Duration::from_nanos(remaining))
        }
    }

    /// Blocks until the duty cycle permits activity.
    ///
    /// Sleeps in steps of at most [`POLL_INTERVAL`] and never past the end
    /// of the idle window. Returns the total time spent waiting.
    pub fn wait_until_active<K: Clock + ?Sized>(&self, clock: &K, start: Duration) -> Duration {
        let mut waited = Duration::ZERO;

        while let Some(remaining) = self.idle_remaining(clock.now().saturating_sub(start)) {
            if waited.is_zero() {
                debug!(
                    idle_secs = remaining.as_secs_f64(),
                    "Idle window, pausing downloads"
                );
            }
            let step = remaining.min(POLL_INTERVAL);
            clock.sleep(step);
            waited += step;
        }

        waited
    }
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(DEFAULT_ACTIVE_WINDOW_SECS),
            idle: Duration::from_secs(DEFAULT_IDLE_WINDOW_SECS),
        }
    }
}

/// Per-session throttle context handed to every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSession {
    /// Clock reading when the session began.
    pub start: Duration,
    pub duty_cycle: DutyCycle,
}

impl FetchSession {
    /// Starts a session at the clock's current time.
    pub fn begin<K: Clock + ?Sized>(clock: &K, duty_cycle: DutyCycle) -> Self {
        Self {
            start: clock.now(),
            duty_cycle,
        }
    }

    /// Blocks until fetching is permitted.
    pub fn wait_until_active<K: Clock + ?Sized>(&self, clock: &K) -> Duration {
        self.duty_cycle.wait_until_active(clock, self.start)
    }
}
