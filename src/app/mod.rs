//! Application core: pure domain orchestration, zero direct I/O.
//!
//! The [`service::ControlService`] drives the range filters and regulators
//! once per loop iteration.  Everything it needs from the outside world
//! comes in through the **port traits** in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
