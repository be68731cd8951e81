//! Inbound commands to the control service.
//!
//! These represent actions requested by the outside world (menu UI,
//! diagnostics console, tests) that the
//! [`ControlService`](super::service::ControlService) interprets and acts upon.

use crate::control::Column;
use crate::faults::FaultKind;
use crate::scheduler::SleepWindow;

/// Commands that external adapters can send into the regulation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Enable or disable automatic regulation of one column.
    SetColumnEnable { column: Column, enabled: bool },

    /// Enable or disable automatic reservoir refill.
    SetReservoirEnable(bool),

    /// Enable or disable every regulator at once.
    SetAllEnable(bool),

    /// Open a column's fill valve for a fixed time (`None` = configured default).
    ManualFill { column: Column, duration_ms: Option<u32> },

    /// Open a column's drain valve for a fixed time (`None` = configured default).
    ManualDrain { column: Column, duration_ms: Option<u32> },

    /// Run the reservoir pump for a fixed time (`None` = configured default).
    ManualPump { duration_ms: Option<u32> },

    /// Pin a column to a static elevation, or `None` to follow the clock.
    OverrideSetpoint { column: Column, setpoint_mm: Option<u16> },

    /// Change the sleep window.
    SetSleepWindow(SleepWindow),

    /// Clear one fault bit.
    ClearFault(FaultKind),

    /// Clear every fault bit.
    ClearAllFaults,

    /// Take a column out of its terminal error state.
    ResetColumn(Column),

    /// Take the reservoir out of its terminal fill-timeout state.
    ResetReservoir,
}
