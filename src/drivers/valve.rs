//! Fill/drain solenoid valve pair for one column.
//!
//! ## Safety contract
//!
//! At most one valve is ever commanded open.  Every open is
//! break-before-make: the opposing valve is closed first, so even a failed
//! write on the opening valve leaves the pair closed or single-open.

use std::rc::Rc;

use embedded_hal::digital::OutputPin;

use super::write_pin;
use crate::faults::{DeviceId, FaultRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Closed,
    Filling,
    Draining,
}

pub struct ValvePair<F: OutputPin, D: OutputPin> {
    id: DeviceId,
    fill: F,
    drain: D,
    faults: Rc<FaultRegistry>,
    state: ValveState,
}

impl<F: OutputPin, D: OutputPin> ValvePair<F, D> {
    /// Take ownership of both outputs and drive them closed.
    pub fn new(id: DeviceId, fill: F, drain: D, faults: Rc<FaultRegistry>) -> Self {
        let mut pair = Self {
            id,
            fill,
            drain,
            faults,
            state: ValveState::Filling,
        };
        pair.stop();
        pair
    }

    pub fn open_fill(&mut self) {
        if self.state == ValveState::Filling {
            return;
        }
        write_pin(&mut self.drain, false, "drain valve", &self.faults);
        write_pin(&mut self.fill, true, "fill valve", &self.faults);
        self.state = ValveState::Filling;
    }

    pub fn open_drain(&mut self) {
        if self.state == ValveState::Draining {
            return;
        }
        write_pin(&mut self.fill, false, "fill valve", &self.faults);
        write_pin(&mut self.drain, true, "drain valve", &self.faults);
        self.state = ValveState::Draining;
    }

    /// Close both valves.  Always written through, whatever the cached state.
    pub fn stop(&mut self) {
        write_pin(&mut self.fill, false, "fill valve", &self.faults);
        write_pin(&mut self.drain, false, "drain valve", &self.faults);
        self.state = ValveState::Closed;
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != ValveState::Closed
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }
}
