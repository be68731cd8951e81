//! Closed-loop regulators.
//!
//! Three-state bang-bang control around a deadband, one independent
//! [`ColumnRegulator`] per digit column and one [`ReservoirRegulator`] for
//! the feed tank.  Every regulator owns its actuators exclusively and
//! reports into the shared [`FaultRegistry`](crate::faults::FaultRegistry).

pub mod column;
pub mod reservoir;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::faults::DeviceId;

pub use column::{ColumnRegulator, ColumnState, ControlError, ManualRequest};
pub use reservoir::{ReservoirRegulator, ReservoirState};

/// Number of digit columns on the clock face.
pub const COLUMN_COUNT: usize = 3;

/// The three digit columns, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Hour,
    TensOfMinutes,
    Minutes,
}

impl Column {
    pub const ALL: [Self; COLUMN_COUNT] = [Self::Hour, Self::TensOfMinutes, Self::Minutes];

    pub const fn index(self) -> usize {
        match self {
            Self::Hour => 0,
            Self::TensOfMinutes => 1,
            Self::Minutes => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    /// Sensor and column faults share the column's device id.
    pub const fn device_id(self) -> DeviceId {
        DeviceId(self.index() as u8)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hour => write!(f, "hour"),
            Self::TensOfMinutes => write!(f, "min10"),
            Self::Minutes => write!(f, "min1"),
        }
    }
}
