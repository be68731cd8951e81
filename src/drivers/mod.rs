//! Actuator drivers: column valve pairs and the reservoir pump.
//!
//! Drivers are dumb: they do what they are told and record the commanded
//! state.  A pin that refuses a write is logged and raised as
//! [`FaultKind::OutputDriver`]; the commanded state is still updated so the
//! regulators' view stays consistent with what they asked for.

pub mod pump;
pub mod valve;

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

use crate::faults::{FaultKind, FaultRegistry};

pub use pump::{Pump, PumpState};
pub use valve::{ValvePair, ValveState};

/// Drive one output, reporting failure into the registry.
pub(crate) fn write_pin<P: OutputPin>(
    pin: &mut P,
    on: bool,
    label: &str,
    faults: &FaultRegistry,
) {
    if let Err(e) = pin.set_state(PinState::from(on)) {
        warn!("{label}: output write failed: {:?}", e);
        faults.set(FaultKind::OutputDriver);
    }
}
