//! Reservoir feed pump (single relay output).
//!
//! ## Safety contract
//!
//! The pump must never run past the high-level switch or beyond its
//! maximum run time.  Both are enforced by the reservoir regulator; this
//! driver is a dumb actuator.

use std::rc::Rc;

use embedded_hal::digital::OutputPin;

use super::write_pin;
use crate::faults::FaultRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Stopped,
    Running,
}

pub struct Pump<P: OutputPin> {
    pin: P,
    faults: Rc<FaultRegistry>,
    state: PumpState,
}

impl<P: OutputPin> Pump<P> {
    pub fn new(pin: P, faults: Rc<FaultRegistry>) -> Self {
        let mut pump = Self {
            pin,
            faults,
            state: PumpState::Running,
        };
        pump.stop();
        pump
    }

    pub fn run(&mut self) {
        if self.state == PumpState::Running {
            return;
        }
        write_pin(&mut self.pin, true, "pump", &self.faults);
        self.state = PumpState::Running;
    }

    pub fn stop(&mut self) {
        write_pin(&mut self.pin, false, "pump", &self.faults);
        self.state = PumpState::Stopped;
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }
}
