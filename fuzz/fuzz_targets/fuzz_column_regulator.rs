//! Fuzz target: `ColumnRegulator::update`
//!
//! Each 4-byte chunk of input is one control step: time advance,
//! elevation, setpoint and an operator action.  After every step the
//! regulator must never have both valves open, and must never drive a
//! valve while in `Error`.
//!
//! cargo fuzz run fuzz_column_regulator

#![no_main]

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use aquaclock::config::ColumnConfig;
use aquaclock::control::{ColumnRegulator, ColumnState};
use aquaclock::faults::{DeviceId, FaultRegistry};
use embedded_hal::digital::{ErrorType, OutputPin};
use libfuzzer_sys::fuzz_target;

#[derive(Clone, Default)]
struct Pin(Rc<Cell<bool>>);

impl ErrorType for Pin {
    type Error = Infallible;
}

impl OutputPin for Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let config = ColumnConfig {
        max_fill_ms: 2_000,
        max_drain_ms: 2_000,
        ..ColumnConfig::default()
    };
    let fill = Pin::default();
    let drain = Pin::default();
    let faults = Rc::new(FaultRegistry::new());
    let mut reg = ColumnRegulator::new(DeviceId(0), config, fill.clone(), drain.clone(), faults);

    let mut now = 0u64;
    for step in data.chunks_exact(4) {
        now += u64::from(step[0]) * 4;
        let elevation = u16::from(step[1]) * 2;
        let setpoint = u16::from(step[2]) * 2;

        match step[3] % 16 {
            0 => {
                reg.request_manual_fill(Some(u32::from(step[3]) * 8));
            }
            1 => {
                reg.request_manual_drain(Some(u32::from(step[3]) * 8));
            }
            2 => reg.set_enabled(!reg.is_enabled()),
            3 => reg.reset(now),
            4 => reg.halt(now),
            _ => {}
        }

        let busy = reg.update(now, elevation, setpoint);

        assert!(!(fill.0.get() && drain.0.get()), "both valves open");
        if reg.state() == ColumnState::Error {
            assert!(!fill.0.get() && !drain.0.get(), "actuating in Error");
        }
        assert_eq!(busy, fill.0.get() || drain.0.get());
        if busy {
            assert!(reg.state().is_actuating(), "valve open in {}", reg.state());
        }
    }
});
