//! Mock hardware for integration tests.
//!
//! Records every output pin write so tests can assert on the full actuation
//! history, and lets each range sensor be scripted from the test body.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use aquaclock::app::events::AppEvent;
use aquaclock::app::ports::{EventSink, RangeDevice, StorageError, StoragePort};
use aquaclock::app::service::{ColumnHardware, ControlService, Hardware};
use aquaclock::config::SystemConfig;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

// ── Recording output pin ──────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RecPin {
    level: Rc<Cell<bool>>,
    writes: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl RecPin {
    pub fn is_on(&self) -> bool {
        self.level.get()
    }

    pub fn writes(&self) -> Vec<bool> {
        self.writes.borrow().clone()
    }

    pub fn clear_history(&self) {
        self.writes.borrow_mut().clear();
    }
}

impl ErrorType for RecPin {
    type Error = Infallible;
}

impl OutputPin for RecPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        self.writes.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        self.writes.borrow_mut().push(true);
        Ok(())
    }
}

// ── Float switch ──────────────────────────────────────────────

/// Active-low float switch: a wet float pulls the line low.
#[derive(Debug, Clone)]
pub struct FloatPin(Rc<Cell<bool>>);

impl FloatPin {
    fn dry() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn set_wet(&self, wet: bool) {
        self.0.set(!wet);
    }
}

impl ErrorType for FloatPin {
    type Error = Infallible;
}

impl InputPin for FloatPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

// ── Scripted range device ─────────────────────────────────────

#[derive(Debug, Default)]
pub struct RangeScript {
    /// Distance reported on every poll; `None` means the sensor is silent.
    pub distance_mm: Option<u16>,
    pub fail_boot: bool,
    pub polls: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoAck;

#[derive(Debug, Clone, Default)]
pub struct ScriptedRange(pub Rc<RefCell<RangeScript>>);

#[allow(dead_code)]
impl ScriptedRange {
    /// Report a distance that puts the water at `elevation_mm` for the
    /// default 355 mm mount.
    pub fn show_elevation(&self, elevation_mm: u16) {
        self.0.borrow_mut().distance_mm = Some(355 - elevation_mm);
    }

    pub fn go_silent(&self) {
        self.0.borrow_mut().distance_mm = None;
    }

    pub fn fail_boot(&self) {
        self.0.borrow_mut().fail_boot = true;
    }
}

impl RangeDevice for ScriptedRange {
    type Error = NoAck;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.0.borrow().fail_boot { Err(NoAck) } else { Ok(()) }
    }

    fn take_reading(&mut self) -> Result<Option<u16>, Self::Error> {
        let mut s = self.0.borrow_mut();
        s.polls += 1;
        Ok(s.distance_mm)
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Test-side handles onto the hardware owned by the service.
pub struct Rig {
    pub ranges: [ScriptedRange; 3],
    pub fills: [RecPin; 3],
    pub drains: [RecPin; 3],
    pub pump: RecPin,
    pub low: FloatPin,
    pub high: FloatPin,
}

#[allow(dead_code)]
impl Rig {
    /// Both floats wet: the reservoir is full and stays out of the way.
    pub fn reservoir_full(&self) {
        self.low.set_wet(true);
        self.high.set_wet(true);
    }

    pub fn any_valve_open(&self) -> bool {
        self.fills.iter().chain(self.drains.iter()).any(RecPin::is_on)
    }
}

pub type MockService = ControlService<ScriptedRange, RecPin, RecPin, FloatPin>;

pub fn rig() -> (Rig, Hardware<ScriptedRange, RecPin, RecPin, FloatPin>) {
    let rig = Rig {
        ranges: Default::default(),
        fills: Default::default(),
        drains: Default::default(),
        pump: RecPin::default(),
        low: FloatPin::dry(),
        high: FloatPin::dry(),
    };
    let hw = Hardware {
        columns: std::array::from_fn(|i| ColumnHardware {
            range: rig.ranges[i].clone(),
            fill: rig.fills[i].clone(),
            drain: rig.drains[i].clone(),
        }),
        pump: rig.pump.clone(),
        low_switch: rig.low.clone(),
        high_switch: rig.high.clone(),
    };
    (rig, hw)
}

/// A started service whose columns all sit at `elevation_mm` and whose
/// reservoir is full.
#[allow(dead_code)]
pub fn started_service(elevation_mm: u16) -> (MockService, Rig, RecordingSink) {
    let (rig, hw) = rig();
    rig.reservoir_full();
    for r in &rig.ranges {
        r.show_elevation(elevation_mm);
    }
    let mut svc = ControlService::new(SystemConfig::default(), hw);
    let mut sink = RecordingSink::default();
    svc.start(0, &mut sink).expect("all sensors boot");
    (svc, rig, sink)
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Failing storage ───────────────────────────────────────────

/// A settings store whose every operation fails with an I/O error.
#[derive(Debug, Default)]
pub struct BrokenStorage;

impl StoragePort for BrokenStorage {
    fn read(&self, _namespace: &str, _key: &str, _buf: &mut [u8]) -> Result<usize, StorageError> {
        Err(StorageError::IoError)
    }

    fn write(&mut self, _namespace: &str, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }

    fn delete(&mut self, _namespace: &str, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }

    fn exists(&self, _namespace: &str, _key: &str) -> bool {
        false
    }
}
