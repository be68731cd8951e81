//! Outbound application events.
//!
//! The [`ControlService`](super::service::ControlService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, refresh the display,
//! record for a test.

use crate::control::{Column, ColumnState, ControlError, ReservoirState, COLUMN_COUNT};
use crate::faults::FaultKind;
use crate::sensors::FilterState;

/// Structured events emitted by the regulation core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started; carries the number of range sensors online.
    Started { sensors_online: u8 },

    /// A column regulator changed state.
    ColumnStateChanged { column: Column, from: ColumnState, to: ColumnState },

    /// The reservoir regulator changed state.
    ReservoirStateChanged { from: ReservoirState, to: ReservoirState },

    /// A fault bit went from clear to set.
    FaultRaised(FaultKind),

    /// A fault bit went from set to clear.
    FaultCleared(FaultKind),

    /// The clock face entered (`true`) or left (`false`) its sleep window.
    SleepChanged(bool),

    /// A command could not be honoured.
    CommandRejected { reason: &'static str },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// One column's view in a telemetry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTelemetry {
    pub state: ColumnState,
    pub sensor: FilterState,
    /// Median of the last three raw readings.
    pub raw_mm: u16,
    pub elevation_mm: u16,
    pub setpoint_mm: u16,
    pub error: ControlError,
    pub enabled: bool,
    pub override_mm: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservoirTelemetry {
    pub state: ReservoirState,
    pub above_low: bool,
    pub above_high: bool,
    pub pumping: bool,
    pub enabled: bool,
}

/// A point-in-time telemetry snapshot suitable for logging or display.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub uptime_ms: u64,
    pub columns: [ColumnTelemetry; COLUMN_COUNT],
    pub reservoir: ReservoirTelemetry,
    pub sleeping: bool,
    pub fault_bits: u32,
}
