//! Port traits: the hexagonal boundary between regulation logic and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Range devices, the wall clock, event sinks and the settings store are
//! reached through these traits.  Valve, pump and level-switch lines use
//! the `embedded-hal` digital traits directly, so any HAL's pins plug in.

use crate::calibration::DigitTables;
use crate::control::COLUMN_COUNT;
use crate::scheduler::{SleepWindow, TimeOfDay};

// ───────────────────────────────────────────────────────────────
// Range device port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A distance sensor looking down a column.
pub trait RangeDevice {
    type Error: core::fmt::Debug;

    /// Configure the device and start continuous ranging.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// A completed measurement in millimetres, or `None` if nothing new
    /// has arrived since the last call.  Must not block.
    fn take_reading(&mut self) -> Result<Option<u16>, Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Wall clock port (driven adapter: calendar clock → domain)
// ───────────────────────────────────────────────────────────────

/// Calendar clock read by the control loop.
pub trait WallClock {
    /// Current local time of day, or `None` if the clock could not be read.
    fn time_of_day(&mut self) -> Option<TimeOfDay>;
}

/// What the clock collaborator feeds the regulators each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockInputs {
    /// Desired elevation per column, indexed by [`Column::index`](crate::control::Column::index).
    pub setpoints: [u16; COLUMN_COUNT],
    pub sleeping: bool,
}

impl ClockInputs {
    pub fn from_time(time: TimeOfDay, digits: &DigitTables, window: &SleepWindow) -> Self {
        Self {
            setpoints: digits.setpoints_for(time.hour, time.minute),
            sleeping: window.is_sleeping(time.hour, time.minute),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log,
/// display, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ settings store)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for operator settings.
///
/// Keys are namespaced to prevent collisions between subsystems.
/// Write operations MUST be atomic: no partial writes on power loss.
pub trait StoragePort {
    /// Copy the stored blob into `buf`, returning its length (truncated to `buf`).
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the blob under `namespace/key`.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Remove a blob.  Removing a missing key is not an error.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Nothing stored under the key yet.
    NotFound,
    /// Blob too large for the store.
    Full,
    /// The backing medium failed.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no stored value"),
            Self::Full => write!(f, "value too large"),
            Self::IoError => write!(f, "storage I/O failure"),
        }
    }
}
