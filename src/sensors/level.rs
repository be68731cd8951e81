//! Float-type reservoir level switches.
//!
//! Each switch is a digital input that changes level when the float is
//! lifted.  As wired on the clock the inputs are pulled up and the switch
//! closes to ground when wet, so `active_low` is the normal setting.
//!
//! A failed pin read keeps the last good value: one glitchy read must not
//! start or stop the pump.

use embedded_hal::digital::InputPin;
use log::warn;

pub struct LevelSwitch<P: InputPin> {
    name: &'static str,
    pin: P,
    active_low: bool,
    wet: bool,
}

impl<P: InputPin> LevelSwitch<P> {
    pub fn new(name: &'static str, pin: P, active_low: bool) -> Self {
        Self {
            name,
            pin,
            active_low,
            wet: false,
        }
    }

    /// Sample the pin.  Returns `true` when the float is submerged.
    pub fn read(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => self.wet = high != self.active_low,
            Err(e) => warn!("LEVEL {}: read failed ({:?}), holding {}", self.name, e, self.wet),
        }
        self.wet
    }

    /// Last sampled value, without touching the pin.
    pub fn is_wet(&self) -> bool {
        self.wet
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}
