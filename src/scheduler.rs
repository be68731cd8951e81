//! Loop timing primitives.
//!
//! The control loop is a cooperative poll: nothing here owns a timer or a
//! callback.  [`Cadence`] answers "has enough time passed to do the expensive
//! part again?" and [`SleepWindow`] answers "is the clock face asleep?".
//!
//! ```text
//!   main loop ──tick(now_ms)──▶ ControlService
//!                                   │
//!            ┌──────────────────────┼──────────────────────┐
//!            ▼                      ▼                      ▼
//!     Cadence (control)     Cadence (telemetry)     SleepWindow(h, m)
//!     run regulators?       emit snapshot?          hold setpoints?
//! ```

use log::info;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// Elapsed-time rate gate.
///
/// `ready(now)` returns `true` at most once per `period_ms`, measured from
/// the last call that returned `true`.  The first call always passes.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    period_ms: u32,
    last_ms: Option<u64>,
}

impl Cadence {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    pub fn ready(&mut self, now_ms: u64) -> bool {
        match self.last_ms {
            Some(last) if now_ms.saturating_sub(last) < u64::from(self.period_ms) => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }

    /// Forget the last firing; the next `ready` passes.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sleep window
// ═══════════════════════════════════════════════════════════════

/// A wall-clock time of day with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }

    fn minutes(self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }
}

/// Time-of-day window during which the clock face is asleep.
///
/// The clock sleeps from `sleep` until `wake`.  Both edges are inclusive
/// at minute resolution, and the window wraps around midnight when
/// `sleep` is later than `wake` (the usual evening-to-morning case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepWindow {
    pub wake: TimeOfDay,
    pub sleep: TimeOfDay,
}

impl Default for SleepWindow {
    fn default() -> Self {
        Self {
            wake: TimeOfDay::new(7, 0),
            sleep: TimeOfDay::new(19, 0),
        }
    }
}

impl SleepWindow {
    /// Check whether `hour:minute` falls within the sleep window.
    pub fn is_sleeping(&self, hour: u8, minute: u8) -> bool {
        let now = TimeOfDay::new(hour, minute).minutes();
        let start = self.sleep.minutes();
        let end = self.wake.minutes();

        if start == end {
            // Degenerate window: never asleep.
            false
        } else if start < end {
            // e.g. 01:00..06:00
            now >= start && now <= end
        } else {
            // e.g. 19:00..07:00, wraps midnight
            now >= start || now <= end
        }
    }

    pub fn is_valid(&self) -> bool {
        self.wake.is_valid() && self.sleep.is_valid()
    }

    pub fn log_summary(&self) {
        info!(
            "Sleep window {:02}:{:02} -> {:02}:{:02}",
            self.sleep.hour, self.sleep.minute, self.wake.hour, self.wake.minute
        );
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
