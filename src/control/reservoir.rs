//! Feed-reservoir refill regulator.
//!
//! Two float switches (low, high) and one pump.  The pump starts when the
//! low float is dry and stops when the high float is wet:
//!
//! ```text
//!   Idle ──(enabled ∧ ¬aboveLow ∧ ¬holdOff)──▶ FillActive ──(aboveHigh ∨ disabled)──▶ FillSettle ──dwell──▶ Idle
//!                                                  │
//!                                                  └──(run > max_pump_ms)──▶ FillTimeoutFault (terminal)
//!   ManualFill: preempts any non-fault state, pumps for the requested time.
//! ```
//!
//! The switch contradiction check runs on every call.  The state machine
//! only steps once per `step_period_ms`; calls in between report busy.

use core::fmt;
use std::rc::Rc;

use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, error, info, warn};

use crate::config::ReservoirConfig;
use crate::drivers::Pump;
use crate::faults::{FaultKind, FaultRegistry};
use crate::sensors::LevelSwitch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservoirState {
    Idle,
    FillActive,
    FillSettle,
    ManualFill { duration_ms: u32 },
    /// Terminal until [`ReservoirRegulator::reset`].
    FillTimeoutFault,
}

impl ReservoirState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::FillActive => "FillActive",
            Self::FillSettle => "FillSettle",
            Self::ManualFill { .. } => "ManualFill",
            Self::FillTimeoutFault => "FillTimeoutFault",
        }
    }

    /// States in which the pump is driven.
    pub fn is_pumping(&self) -> bool {
        matches!(self, Self::FillActive | Self::ManualFill { .. })
    }
}

impl fmt::Display for ReservoirState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ReservoirRegulator<P: OutputPin, L: InputPin> {
    config: ReservoirConfig,
    pump: Pump<P>,
    low: LevelSwitch<L>,
    high: LevelSwitch<L>,
    faults: Rc<FaultRegistry>,
    enabled: bool,
    hold_off: bool,
    state: ReservoirState,
    entered_ms: u64,
    last_step_ms: Option<u64>,
    pending_ms: Option<u32>,
    above_low: bool,
    above_high: bool,
}

impl<P: OutputPin, L: InputPin> ReservoirRegulator<P, L> {
    pub fn new(config: ReservoirConfig, pump: P, low: L, high: L, faults: Rc<FaultRegistry>) -> Self {
        let active_low = config.switches_active_low;
        Self {
            config,
            pump: Pump::new(pump, faults.clone()),
            low: LevelSwitch::new("low", low, active_low),
            high: LevelSwitch::new("high", high, active_low),
            faults,
            enabled: true,
            hold_off: false,
            state: ReservoirState::Idle,
            entered_ms: 0,
            last_step_ms: None,
            pending_ms: None,
            above_low: false,
            above_high: false,
        }
    }

    /// Sample the switches and, if the step period has elapsed, advance the
    /// state machine.  Returns `true` while pumping, and on skipped calls.
    pub fn update(&mut self, now_ms: u64) -> bool {
        self.above_low = self.low.read();
        self.above_high = self.high.read();

        if self.above_high && !self.above_low {
            self.faults.set(FaultKind::LevelSenseContradiction);
        }

        if let Some(last) = self.last_step_ms {
            if now_ms.saturating_sub(last) < u64::from(self.config.step_period_ms) {
                return true;
            }
        }
        self.last_step_ms = Some(now_ms);
        self.step(now_ms);
        self.is_busy()
    }

    fn step(&mut self, now_ms: u64) {
        if let Some(duration_ms) = self.pending_ms.take() {
            if self.state == ReservoirState::FillTimeoutFault {
                warn!("RESERVOIR: manual fill dropped, pump is faulted");
            } else {
                self.transition(ReservoirState::ManualFill { duration_ms }, now_ms);
            }
        }

        let elapsed = now_ms.saturating_sub(self.entered_ms);

        match self.state {
            ReservoirState::Idle => {
                if self.enabled && !self.above_low {
                    if self.hold_off {
                        debug!("RESERVOIR: low, fill held off");
                    } else {
                        self.pump.stop();
                        self.transition(ReservoirState::FillActive, now_ms);
                    }
                }
            }

            ReservoirState::FillActive => {
                if self.above_high || !self.enabled {
                    self.pump.stop();
                    self.transition(ReservoirState::FillSettle, now_ms);
                } else if elapsed > u64::from(self.config.max_pump_ms) {
                    self.pump.stop();
                    error!("RESERVOIR: pump ran {} ms without reaching high float", elapsed);
                    self.faults.set(FaultKind::ReservoirFillTimeout);
                    self.transition(ReservoirState::FillTimeoutFault, now_ms);
                } else {
                    self.pump.run();
                }
            }

            ReservoirState::FillSettle => {
                if elapsed >= u64::from(self.config.settle_ms) {
                    self.transition(ReservoirState::Idle, now_ms);
                }
            }

            ReservoirState::ManualFill { duration_ms } => {
                // The high float ends a manual run early.
                if elapsed >= u64::from(duration_ms) || self.above_high {
                    self.pump.stop();
                    self.transition(ReservoirState::Idle, now_ms);
                } else {
                    self.pump.run();
                }
            }

            ReservoirState::FillTimeoutFault => {
                if self.pump.is_running() {
                    self.pump.stop();
                }
            }
        }
    }

    /// Latch a manual pump run; `None` uses the configured default.
    /// Returns `false` if the pump is faulted and the request was dropped.
    pub fn request_manual_fill(&mut self, duration_ms: Option<u32>) -> bool {
        if self.state == ReservoirState::FillTimeoutFault {
            warn!("RESERVOIR: manual fill refused, reset the reservoir first");
            return false;
        }
        self.pending_ms = Some(duration_ms.unwrap_or(self.config.manual_fill_ms));
        true
    }

    /// Operator reset out of `FillTimeoutFault`.  Does not clear the registry bit.
    pub fn reset(&mut self, now_ms: u64) {
        self.pump.stop();
        if self.state == ReservoirState::FillTimeoutFault {
            info!("RESERVOIR: reset");
            self.transition(ReservoirState::Idle, now_ms);
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("RESERVOIR: refill {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    /// While set, an automatic fill is not started.  A running fill continues.
    pub fn set_hold_off(&mut self, hold_off: bool) {
        self.hold_off = hold_off;
    }

    fn transition(&mut self, next: ReservoirState, now_ms: u64) {
        info!("RESERVOIR: {} -> {}", self.state, next);
        self.state = next;
        self.entered_ms = now_ms;
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> ReservoirState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_pumping()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn above_low(&self) -> bool {
        self.above_low
    }

    pub fn above_high(&self) -> bool {
        self.above_high
    }

    pub fn pump(&self) -> &Pump<P> {
        &self.pump
    }

    pub fn time_in_state_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }
}
