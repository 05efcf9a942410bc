//! Time source used by the wait loop and by time-dependent delay strategies.
//!
//! Nothing in this crate reads the wall clock directly; everything goes
//! through a [`Clock`] so that tests can substitute
//! [`MockClock`](crate::testing::MockClock).

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// A source of monotonic and wall-clock time that can also pause.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Monotonic time, used to measure elapsed durations.
    fn now(&self) -> Instant;

    /// Wall-clock time, used to interpret HTTP dates.
    fn system_time(&self) -> SystemTime;

    /// Block the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// A shared [`SystemClock`].
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
