//! System fault registry.
//!
//! A single 32-bit bitmap holds every fault condition the regulation core
//! can raise.  If a bit is set the fault is active.  Faults are **sticky**:
//! nothing in the core clears a bit on its own, clearing is an operator
//! action routed in through [`AppCommand`](crate::app::commands::AppCommand).
//!
//! ```text
//!  bit  0..=4   fixed system faults (driver, clock, storage, reservoir)
//!  bit  8..=11  SensorInit(device 0..=3)
//!  bit 12..=15  SensorTimeout(device 0..=3)
//!  bit 16..=19  ActuatorTimeout(device 0..=3)
//! ```
//!
//! The registry is shared between components as an `Rc<FaultRegistry>`.
//! Execution is single-threaded and cooperative, so the interior `Cell`
//! needs no lock.  Bits are partitioned by producer: each component only
//! raises the faults that carry its own [`DeviceId`].

use core::cell::Cell;
use core::fmt;

use log::{error, info};

/// Number of device slots per parameterised fault family.
/// Device ids at or beyond this value share the last slot.
pub const DEVICE_SLOTS: u8 = 4;

/// Identity of a sensor or column (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u8);

impl DeviceId {
    fn slot(self) -> u32 {
        self.0.min(DEVICE_SLOTS - 1) as u32
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of fault causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// An actuator output driver failed to accept a write.
    OutputDriver,
    /// The calendar clock failed to deliver a reading.
    ClockRead,
    /// Persisted settings could not be read or written.
    StorageFailure,
    /// The reservoir pump ran longer than its maximum period.
    ReservoirFillTimeout,
    /// Reservoir level switches report high-wet with low-dry.
    LevelSenseContradiction,
    /// A range sensor failed to initialise.
    SensorInit(DeviceId),
    /// A range sensor stopped delivering readings.
    SensorTimeout(DeviceId),
    /// A column spent too long actively filling or draining.
    ActuatorTimeout(DeviceId),
}

impl FaultKind {
    /// Bit index of this fault in the registry bitmap.
    pub fn bit(self) -> u32 {
        match self {
            Self::OutputDriver => 0,
            Self::ClockRead => 1,
            Self::StorageFailure => 2,
            Self::ReservoirFillTimeout => 3,
            Self::LevelSenseContradiction => 4,
            Self::SensorInit(id) => 8 + id.slot(),
            Self::SensorTimeout(id) => 12 + id.slot(),
            Self::ActuatorTimeout(id) => 16 + id.slot(),
        }
    }

    /// Bitmask for this fault.
    pub fn mask(self) -> u32 {
        1 << self.bit()
    }

    /// Inverse of [`bit`](Self::bit).  `None` for unassigned bits.
    pub fn from_bit(bit: u32) -> Option<Self> {
        let fixed = [
            Self::OutputDriver,
            Self::ClockRead,
            Self::StorageFailure,
            Self::ReservoirFillTimeout,
            Self::LevelSenseContradiction,
        ];
        match bit {
            0..=4 => Some(fixed[bit as usize]),
            8..=11 => Some(Self::SensorInit(DeviceId((bit - 8) as u8))),
            12..=15 => Some(Self::SensorTimeout(DeviceId((bit - 12) as u8))),
            16..=19 => Some(Self::ActuatorTimeout(DeviceId((bit - 16) as u8))),
            _ => None,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputDriver => write!(f, "output driver fail"),
            Self::ClockRead => write!(f, "RTC read fault"),
            Self::StorageFailure => write!(f, "settings storage fail"),
            Self::ReservoirFillTimeout => write!(f, "tank fill timeout"),
            Self::LevelSenseContradiction => write!(f, "tank level sense fail"),
            Self::SensorInit(id) => write!(f, "range sensor {} init fail", id.slot()),
            Self::SensorTimeout(id) => write!(f, "range sensor {} timeout", id.slot()),
            Self::ActuatorTimeout(id) => write!(f, "column {} actuator timeout", id.slot()),
        }
    }
}

/// Upper bound on simultaneously listed faults (one per bitmap bit).
pub const MAX_FAULTS: usize = 32;

/// Process-lifetime fault bitmap.
#[derive(Debug, Default)]
pub struct FaultRegistry {
    bits: Cell<u32>,
}

impl FaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fault active.  Idempotent; logs only on the inactive→active edge.
    pub fn set(&self, kind: FaultKind) {
        let bits = self.bits.get();
        if bits & kind.mask() == 0 {
            error!("FAULT SET: {kind}");
        }
        self.bits.set(bits | kind.mask());
    }

    /// Mark a fault inactive.  Idempotent.
    pub fn clear(&self, kind: FaultKind) {
        let bits = self.bits.get();
        if bits & kind.mask() != 0 {
            info!("FAULT CLEARED: {kind}");
        }
        self.bits.set(bits & !kind.mask());
    }

    /// Clear every fault (operator reset).
    pub fn clear_all(&self) {
        if self.bits.get() != 0 {
            info!("FAULT CLEARED: all (was 0x{:08x})", self.bits.get());
        }
        self.bits.set(0);
    }

    pub fn is_active(&self, kind: FaultKind) -> bool {
        self.bits.get() & kind.mask() != 0
    }

    pub fn any_active(&self) -> bool {
        self.bits.get() != 0
    }

    /// Raw read-only view of the bitmap.
    pub fn bits(&self) -> u32 {
        self.bits.get()
    }

    /// Every active fault, lowest bit first.
    pub fn active(&self) -> heapless::Vec<FaultKind, MAX_FAULTS> {
        let bits = self.bits.get();
        let mut out = heapless::Vec::new();
        for bit in 0..32 {
            if bits & (1 << bit) != 0 {
                if let Some(kind) = FaultKind::from_bit(bit) {
                    let _ = out.push(kind);
                }
            }
        }
        out
    }
}
