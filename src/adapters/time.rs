//! Host time adapters.
//!
//! - [`MonotonicClock`]: milliseconds since construction, from
//!   `std::time::Instant`.  Feeds `now_ms` to every `update`/`tick`.
//! - [`SimWallClock`]: a calendar clock that runs from a chosen start time,
//!   optionally faster than real time, for the simulation binary.

use std::time::Instant;

use crate::app::ports::WallClock;
use crate::scheduler::TimeOfDay;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// Monotonic millisecond counter.
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since construction (monotonic).
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Simulated calendar clock.
///
/// Wall time = `start` + `speedup` × (monotonic time since the first
/// [`advance_to`](Self::advance_to)).  Reads can be forced to fail to
/// exercise the clock fault path.
pub struct SimWallClock {
    start_ms_of_day: u64,
    speedup: u32,
    elapsed_ms: u64,
    failing: bool,
}

impl SimWallClock {
    pub fn new(start: TimeOfDay, speedup: u32) -> Self {
        Self {
            start_ms_of_day: (u64::from(start.hour) * 60 + u64::from(start.minute)) * 60_000,
            speedup: speedup.max(1),
            elapsed_ms: 0,
            failing: false,
        }
    }

    /// Move the clock to `now_ms` of monotonic time.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.elapsed_ms = now_ms;
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }
}

impl WallClock for SimWallClock {
    fn time_of_day(&mut self) -> Option<TimeOfDay> {
        if self.failing {
            return None;
        }
        let ms = (self.start_ms_of_day + self.elapsed_ms * u64::from(self.speedup)) % MS_PER_DAY;
        let minutes = ms / 60_000;
        Some(TimeOfDay::new((minutes / 60) as u8, (minutes % 60) as u8))
    }
}
