//! Simulated plant for the host binary and integration tests.
//!
//! Three columns fed from one reservoir.  A fill valve moves water from the
//! reservoir into its column, a drain valve returns it to a sump, and the
//! pump lifts sump water back into the reservoir.  Range sensors report the
//! distance from the sensor face to the water surface with a small fixed
//! jitter pattern.
//!
//! ```text
//!   sump ──pump──▶ reservoir ──fill──▶ column ──drain──▶ sump
//! ```

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::app::ports::RangeDevice;
use crate::app::service::{ColumnHardware, Hardware};
use crate::control::COLUMN_COUNT;

/// Repeating measurement noise, mm.
const JITTER_MM: [i16; 5] = [0, 2, -1, 3, -2];

// ───────────────────────────────────────────────────────────────
// Digital lines
// ───────────────────────────────────────────────────────────────

/// A digital line usable as either an output or an input.
#[derive(Debug, Clone, Default)]
pub struct Line(Rc<Cell<bool>>);

impl Line {
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    pub fn set(&self, high: bool) {
        self.0.set(high);
    }
}

impl ErrorType for Line {
    type Error = Infallible;
}

impl OutputPin for Line {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

impl InputPin for Line {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

// ───────────────────────────────────────────────────────────────
// Plant model
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PlantParams {
    /// Column rise rate with the fill valve open.
    pub fill_mm_per_s: f32,
    /// Column fall rate with the drain valve open.
    pub drain_mm_per_s: f32,
    /// Reservoir fall rate per open fill valve.
    pub draw_mm_per_s: f32,
    /// Reservoir rise rate with the pump on.
    pub pump_mm_per_s: f32,
    /// Sensor face to column floor.
    pub mount_height_mm: u16,
    pub reservoir_capacity_mm: f32,
    pub low_mark_mm: f32,
    pub high_mark_mm: f32,
    /// Interval between range measurements.
    pub range_period_ms: u64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            fill_mm_per_s: 25.0,
            drain_mm_per_s: 30.0,
            draw_mm_per_s: 4.0,
            pump_mm_per_s: 10.0,
            mount_height_mm: 355,
            reservoir_capacity_mm: 200.0,
            low_mark_mm: 60.0,
            high_mark_mm: 160.0,
            range_period_ms: 33,
        }
    }
}

struct SimColumn {
    elevation_mm: f32,
    fill: Line,
    drain: Line,
    /// Sensor stops producing readings.
    stalled: bool,
    /// Sensor refuses to start.
    fail_boot: bool,
}

pub struct Plant {
    params: PlantParams,
    columns: [SimColumn; COLUMN_COUNT],
    reservoir_mm: f32,
    pump: Line,
    /// Switch lines are active-low: a wet float pulls the line low.
    low: Line,
    high: Line,
    now_ms: u64,
}

pub type SharedPlant = Rc<RefCell<Plant>>;

impl Plant {
    /// Advance the physics to `now_ms`.
    pub fn step(&mut self, now_ms: u64) {
        let dt = now_ms.saturating_sub(self.now_ms) as f32 / 1000.0;
        self.now_ms = now_ms;
        let p = self.params;
        let top = f32::from(p.mount_height_mm);

        for c in &mut self.columns {
            if c.fill.is_set() && self.reservoir_mm > 0.0 {
                c.elevation_mm = (c.elevation_mm + p.fill_mm_per_s * dt).min(top);
                self.reservoir_mm = (self.reservoir_mm - p.draw_mm_per_s * dt).max(0.0);
            }
            if c.drain.is_set() {
                c.elevation_mm = (c.elevation_mm - p.drain_mm_per_s * dt).max(0.0);
            }
        }
        if self.pump.is_set() {
            self.reservoir_mm = (self.reservoir_mm + p.pump_mm_per_s * dt).min(p.reservoir_capacity_mm);
        }

        self.low.set(self.reservoir_mm < p.low_mark_mm);
        self.high.set(self.reservoir_mm < p.high_mark_mm);
    }

    pub fn elevation_mm(&self, column: usize) -> f32 {
        self.columns[column].elevation_mm
    }

    pub fn set_elevation_mm(&mut self, column: usize, mm: f32) {
        self.columns[column].elevation_mm = mm;
    }

    pub fn reservoir_mm(&self) -> f32 {
        self.reservoir_mm
    }

    pub fn set_reservoir_mm(&mut self, mm: f32) {
        self.reservoir_mm = mm;
        self.step(self.now_ms);
    }

    pub fn stall_sensor(&mut self, column: usize, stalled: bool) {
        self.columns[column].stalled = stalled;
    }

    pub fn fail_sensor_boot(&mut self, column: usize) {
        self.columns[column].fail_boot = true;
    }

    pub fn valves(&self, column: usize) -> (bool, bool) {
        let c = &self.columns[column];
        (c.fill.is_set(), c.drain.is_set())
    }

    pub fn pump_on(&self) -> bool {
        self.pump.is_set()
    }

    /// Force the level switch lines, bypassing the reservoir model until the
    /// next [`step`](Self::step).
    pub fn force_switches(&mut self, low_wet: bool, high_wet: bool) {
        self.low.set(!low_wet);
        self.high.set(!high_wet);
    }
}

// ───────────────────────────────────────────────────────────────
// Range device
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimRangeError {
    NoAck,
}

pub struct SimRange {
    plant: SharedPlant,
    column: usize,
    next_due_ms: u64,
    jitter: usize,
}

impl RangeDevice for SimRange {
    type Error = SimRangeError;

    fn start(&mut self) -> Result<(), Self::Error> {
        if self.plant.borrow().columns[self.column].fail_boot {
            return Err(SimRangeError::NoAck);
        }
        self.next_due_ms = self.plant.borrow().now_ms;
        Ok(())
    }

    fn take_reading(&mut self) -> Result<Option<u16>, Self::Error> {
        let plant = self.plant.borrow();
        let c = &plant.columns[self.column];
        if c.stalled || plant.now_ms < self.next_due_ms {
            return Ok(None);
        }
        self.next_due_ms = plant.now_ms + plant.params.range_period_ms;

        let surface = f32::from(plant.params.mount_height_mm) - c.elevation_mm;
        let noise = f32::from(JITTER_MM[self.jitter % JITTER_MM.len()]);
        self.jitter += 1;
        Ok(Some((surface + noise).clamp(0.0, f32::from(u16::MAX)) as u16))
    }
}

// ───────────────────────────────────────────────────────────────
// Wiring
// ───────────────────────────────────────────────────────────────

/// Build a plant and the hardware bundle that drives it.
///
/// Columns start at `start_elevation_mm`, the reservoir half full.
pub fn build(params: PlantParams, start_elevation_mm: f32) -> (SharedPlant, Hardware<SimRange, Line, Line, Line>) {
    let columns: [SimColumn; COLUMN_COUNT] = core::array::from_fn(|_| SimColumn {
        elevation_mm: start_elevation_mm,
        fill: Line::default(),
        drain: Line::default(),
        stalled: false,
        fail_boot: false,
    });
    let pump = Line::default();
    let low = Line::default();
    let high = Line::default();

    let plant = Rc::new(RefCell::new(Plant {
        params,
        reservoir_mm: params.reservoir_capacity_mm / 2.0,
        columns,
        pump: pump.clone(),
        low: low.clone(),
        high: high.clone(),
        now_ms: 0,
    }));
    plant.borrow_mut().step(0);

    let hw_columns = core::array::from_fn(|i| {
        let p = plant.borrow();
        ColumnHardware {
            range: SimRange {
                plant: plant.clone(),
                column: i,
                next_due_ms: 0,
                jitter: i,
            },
            fill: p.columns[i].fill.clone(),
            drain: p.columns[i].drain.clone(),
        }
    });

    let hw = Hardware {
        columns: hw_columns,
        pump,
        low_switch: low,
        high_switch: high,
    };
    (plant, hw)
}
