use std::time::Instant;

use chrono::{DateTime, Local};

/// Time source for the engine. Monotonic instants drive every timer; the
/// wall clock is only consulted for quiet hours and the daily rollover.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn wall_now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Local> {
        Local::now()
    }
}
