//! Per-column fill/drain regulator.
//!
//! ```text
//!                 ┌──────────── Positive ───────────┐
//!                 │                                 ▼
//!   ┌────────┐    │   settled    ┌────────────┐  ┌────────────┐ timeout ┌───────┐
//!   │  Idle  │◀───┴──────────────│ FillSettle │◀─│ FillActive │────────▶│ Error │
//!   └────────┘◀───┬──────────────│DrainSettle │◀─│DrainActive │────────▶│       │
//!        ▲        │              └────────────┘  └────────────┘         └───────┘
//!        │        └──────────── Negative ───────────┘
//!        │
//!   ManualFill / ManualDrain: preempt any non-Error state, return to Idle
//!   when the requested duration has elapsed.
//! ```
//!
//! Time-in-state is `now_ms - entered_ms`, with `entered_ms` stamped on every
//! transition and never touched otherwise.

use core::fmt;
use std::rc::Rc;

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::config::ColumnConfig;
use crate::drivers::ValvePair;
use crate::faults::{DeviceId, FaultKind, FaultRegistry};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnState {
    Idle,
    DrainActive,
    DrainSettle,
    FillActive,
    FillSettle,
    ManualDrain { duration_ms: u32 },
    ManualFill { duration_ms: u32 },
    /// Terminal until [`ColumnRegulator::reset`].
    Error,
}

impl ColumnState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DrainActive => "DrainActive",
            Self::DrainSettle => "DrainSettle",
            Self::FillActive => "FillActive",
            Self::FillSettle => "FillSettle",
            Self::ManualDrain { .. } => "ManualDrain",
            Self::ManualFill { .. } => "ManualFill",
            Self::Error => "Error",
        }
    }

    /// States in which a valve is driven.
    pub fn is_actuating(&self) -> bool {
        matches!(
            self,
            Self::FillActive | Self::DrainActive | Self::ManualFill { .. } | Self::ManualDrain { .. }
        )
    }
}

impl fmt::Display for ColumnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sign of the regulation error, recomputed every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    Deadband,
    /// Below setpoint, needs fill.
    Positive,
    /// Above setpoint, needs drain.
    Negative,
}

impl ControlError {
    pub fn evaluate(elevation_mm: u16, setpoint_mm: u16, deadband_mm: u16) -> Self {
        let diff = i32::from(elevation_mm) - i32::from(setpoint_mm);
        if diff.abs() <= i32::from(deadband_mm) {
            Self::Deadband
        } else if diff < 0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

/// A latched one-shot manual actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualRequest {
    Fill { duration_ms: u32 },
    Drain { duration_ms: u32 },
}

// ---------------------------------------------------------------------------
// Regulator
// ---------------------------------------------------------------------------

pub struct ColumnRegulator<F: OutputPin, D: OutputPin> {
    id: DeviceId,
    config: ColumnConfig,
    valves: ValvePair<F, D>,
    faults: Rc<FaultRegistry>,
    enabled: bool,
    state: ColumnState,
    entered_ms: u64,
    pending: Option<ManualRequest>,
    error: ControlError,
    elevation_mm: u16,
    setpoint_mm: u16,
}

impl<F: OutputPin, D: OutputPin> ColumnRegulator<F, D> {
    /// Build a regulator in `Idle`, enabled, with both valves closed.
    pub fn new(id: DeviceId, config: ColumnConfig, fill: F, drain: D, faults: Rc<FaultRegistry>) -> Self {
        let valves = ValvePair::new(id, fill, drain, faults.clone());
        Self {
            id,
            config,
            valves,
            faults,
            enabled: true,
            state: ColumnState::Idle,
            entered_ms: 0,
            pending: None,
            error: ControlError::Deadband,
            elevation_mm: 0,
            setpoint_mm: config.lower_limit_mm,
        }
    }

    /// Run one regulation step.  Returns `true` while a valve is driven,
    /// so the step that only enters `FillActive`/`DrainActive` reports idle.
    pub fn update(&mut self, now_ms: u64, elevation_mm: u16, setpoint_mm: u16) -> bool {
        let setpoint_mm = setpoint_mm.clamp(self.config.lower_limit_mm, self.config.upper_limit_mm);
        self.elevation_mm = elevation_mm;
        self.setpoint_mm = setpoint_mm;
        self.error = ControlError::evaluate(elevation_mm, setpoint_mm, self.config.deadband_mm);

        if let Some(req) = self.pending.take() {
            if self.state == ColumnState::Error {
                warn!("COLUMN {}: {:?} dropped, column is faulted", self.id, req);
            } else {
                let next = match req {
                    ManualRequest::Fill { duration_ms } => ColumnState::ManualFill { duration_ms },
                    ManualRequest::Drain { duration_ms } => ColumnState::ManualDrain { duration_ms },
                };
                self.transition(next, now_ms);
            }
        }

        let elapsed = now_ms.saturating_sub(self.entered_ms);

        match self.state {
            ColumnState::Idle => {
                if self.enabled {
                    match self.error {
                        ControlError::Positive => {
                            self.valves.stop();
                            self.transition(ColumnState::FillActive, now_ms);
                        }
                        ControlError::Negative => {
                            self.valves.stop();
                            self.transition(ColumnState::DrainActive, now_ms);
                        }
                        ControlError::Deadband => {}
                    }
                }
            }

            ColumnState::FillActive => {
                if self.error != ControlError::Positive || !self.enabled {
                    self.valves.stop();
                    self.transition(ColumnState::FillSettle, now_ms);
                } else if elapsed >= u64::from(self.config.max_fill_ms) {
                    self.fault_timeout(now_ms, "fill");
                } else {
                    self.valves.open_fill();
                }
            }

            ColumnState::DrainActive => {
                if self.error != ControlError::Negative || !self.enabled {
                    self.valves.stop();
                    self.transition(ColumnState::DrainSettle, now_ms);
                } else if elapsed >= u64::from(self.config.max_drain_ms) {
                    self.fault_timeout(now_ms, "drain");
                } else {
                    self.valves.open_drain();
                }
            }

            ColumnState::FillSettle => {
                if elapsed >= u64::from(self.config.fill_dwell_ms) {
                    self.transition(ColumnState::Idle, now_ms);
                }
            }

            ColumnState::DrainSettle => {
                if elapsed >= u64::from(self.config.drain_dwell_ms) {
                    self.transition(ColumnState::Idle, now_ms);
                }
            }

            ColumnState::ManualFill { duration_ms } => {
                if elapsed >= u64::from(duration_ms) {
                    self.valves.stop();
                    self.transition(ColumnState::Idle, now_ms);
                } else {
                    self.valves.open_fill();
                }
            }

            ColumnState::ManualDrain { duration_ms } => {
                if elapsed >= u64::from(duration_ms) {
                    self.valves.stop();
                    self.transition(ColumnState::Idle, now_ms);
                } else {
                    self.valves.open_drain();
                }
            }

            ColumnState::Error => {
                if self.valves.is_open() {
                    self.valves.stop();
                }
            }
        }

        debug!(
            "COLUMN {}: {} elev={} sp={} err={:?}",
            self.id, self.state, self.elevation_mm, self.setpoint_mm, self.error
        );
        self.is_busy()
    }

    /// Hold the column safe without regulating.
    ///
    /// Used when the column's sensor can no longer be trusted: valves close,
    /// pending manual requests are discarded and the column parks in `Idle`
    /// (or stays in `Error`).
    pub fn halt(&mut self, now_ms: u64) {
        if self.valves.is_open() {
            self.valves.stop();
        }
        if let Some(req) = self.pending.take() {
            warn!("COLUMN {}: {:?} dropped, column halted", self.id, req);
        }
        if !matches!(self.state, ColumnState::Idle | ColumnState::Error) {
            self.transition(ColumnState::Idle, now_ms);
        }
    }

    /// Operator reset out of `Error`.  Does not clear the registry bit.
    pub fn reset(&mut self, now_ms: u64) {
        self.valves.stop();
        if self.state == ColumnState::Error {
            info!("COLUMN {}: reset", self.id);
            self.transition(ColumnState::Idle, now_ms);
        }
    }

    /// Latch a manual fill; `None` uses the configured default duration.
    /// Returns `false` if the column is faulted and the request was dropped.
    pub fn request_manual_fill(&mut self, duration_ms: Option<u32>) -> bool {
        let duration_ms = duration_ms.unwrap_or(self.config.manual_fill_ms);
        self.latch(ManualRequest::Fill { duration_ms })
    }

    /// Latch a manual drain; `None` uses the configured default duration.
    pub fn request_manual_drain(&mut self, duration_ms: Option<u32>) -> bool {
        let duration_ms = duration_ms.unwrap_or(self.config.manual_drain_ms);
        self.latch(ManualRequest::Drain { duration_ms })
    }

    fn latch(&mut self, req: ManualRequest) -> bool {
        if self.state == ColumnState::Error {
            warn!("COLUMN {}: {:?} refused, reset the column first", self.id, req);
            return false;
        }
        if let Some(prev) = self.pending.replace(req) {
            debug!("COLUMN {}: {:?} superseded", self.id, prev);
        }
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(
                "COLUMN {}: regulation {}",
                self.id,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enabled;
    }

    fn fault_timeout(&mut self, now_ms: u64, what: &str) {
        self.valves.stop();
        error!(
            "COLUMN {}: {} exceeded max period, elev={} sp={}",
            self.id, what, self.elevation_mm, self.setpoint_mm
        );
        self.faults.set(FaultKind::ActuatorTimeout(self.id));
        self.transition(ColumnState::Error, now_ms);
    }

    fn transition(&mut self, next: ColumnState, now_ms: u64) {
        info!("COLUMN {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.entered_ms = now_ms;
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn state(&self) -> ColumnState {
        self.state
    }

    /// `true` while either valve is open.
    pub fn is_busy(&self) -> bool {
        self.valves.is_open()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn control_error(&self) -> ControlError {
        self.error
    }

    pub fn elevation_mm(&self) -> u16 {
        self.elevation_mm
    }

    /// Last setpoint after clamping.
    pub fn setpoint_mm(&self) -> u16 {
        self.setpoint_mm
    }

    pub fn time_in_state_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }

    pub fn pending_manual(&self) -> Option<ManualRequest> {
        self.pending
    }

    pub fn config(&self) -> &ColumnConfig {
        &self.config
    }

    pub fn valves(&self) -> &ValvePair<F, D> {
        &self.valves
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
