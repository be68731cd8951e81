//! Time-of-flight range sensor filter.
//!
//! Wraps one [`RangeDevice`], keeps the three most recent raw samples
//! (newest first) and publishes their median.  Health is monitored on every
//! [`update`](RangeSensorFilter::update): a sensor that stops answering for
//! longer than the read timeout raises [`FaultKind::SensorTimeout`], and one
//! that never boots raises [`FaultKind::SensorInit`] and stays dead for the
//! rest of the run.
//!
//! ```text
//!             start() ok
//!  Uninitialized ────────▶ Working ◀──────┐
//!        │                   │            │ fresh reading
//!        │ start() err       │ no reading │
//!        ▼                   ▼ > timeout  │
//!    InitError            TimedOut ───────┘
//! ```

use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::app::ports::RangeDevice;
use crate::error::SensorInitError;
use crate::faults::{DeviceId, FaultKind, FaultRegistry};

/// Number of samples the median is taken over.
pub const HISTORY_LEN: usize = 3;

/// Health of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// `start` has not been called.
    Uninitialized,
    /// The device failed to start.  Permanent for this run.
    InitError,
    Working,
    /// No reading within the timeout window.
    TimedOut,
}

/// Median of three with a deterministic tie-break.
///
/// The first-seen maximum and first-seen minimum are located; the remaining
/// index is the median.  When all three are equal both searches stop at
/// index 0 and the first value is returned.
pub fn median_of_three(v: [u16; HISTORY_LEN]) -> u16 {
    let mut max_i = 0;
    let mut min_i = 0;
    for i in 1..HISTORY_LEN {
        if v[i] > v[max_i] {
            max_i = i;
        }
        if v[i] < v[min_i] {
            min_i = i;
        }
    }
    if max_i == min_i {
        return v[0];
    }
    v[3 - max_i - min_i]
}

pub struct RangeSensorFilter<S: RangeDevice> {
    id: DeviceId,
    device: S,
    faults: Rc<FaultRegistry>,
    read_timeout_ms: u32,
    state: FilterState,
    /// Newest first, zero-filled until real readings arrive.
    history: [u16; HISTORY_LEN],
    median: u16,
    linearized_median: u16,
    last_reading_ms: u64,
    /// Real readings received, saturating at `HISTORY_LEN`.
    readings: u8,
}

impl<S: RangeDevice> RangeSensorFilter<S> {
    pub fn new(id: DeviceId, device: S, faults: Rc<FaultRegistry>, read_timeout_ms: u32) -> Self {
        Self {
            id,
            device,
            faults,
            read_timeout_ms,
            state: FilterState::Uninitialized,
            history: [0; HISTORY_LEN],
            median: 0,
            linearized_median: 0,
            last_reading_ms: 0,
            readings: 0,
        }
    }

    /// Configure and start the underlying device.
    ///
    /// On failure the sensor's init fault is raised and the filter is left
    /// in [`FilterState::InitError`]; there is no retry.
    pub fn start(&mut self, now_ms: u64) -> Result<(), SensorInitError> {
        if self.state == FilterState::InitError {
            return Err(SensorInitError { sensor: self.id });
        }
        match self.device.start() {
            Ok(()) => {
                info!("RANGE {}: started", self.id);
                self.state = FilterState::Working;
                self.last_reading_ms = now_ms;
                Ok(())
            }
            Err(e) => {
                error!("RANGE {}: failed to boot: {:?}", self.id, e);
                self.state = FilterState::InitError;
                self.faults.set(FaultKind::SensorInit(self.id));
                Err(SensorInitError { sensor: self.id })
            }
        }
    }

    /// Poll the device once.  No-op unless the filter has started.
    pub fn update(&mut self, now_ms: u64) {
        if !matches!(self.state, FilterState::Working | FilterState::TimedOut) {
            return;
        }

        match self.device.take_reading() {
            Ok(Some(mm)) => self.accept(mm, now_ms),
            Ok(None) => {}
            Err(e) => debug!("RANGE {}: read error: {:?}", self.id, e),
        }

        if now_ms.saturating_sub(self.last_reading_ms) > u64::from(self.read_timeout_ms) {
            if self.state != FilterState::TimedOut {
                warn!(
                    "RANGE {}: no reading for {} ms",
                    self.id,
                    now_ms.saturating_sub(self.last_reading_ms)
                );
                self.state = FilterState::TimedOut;
            }
            let kind = FaultKind::SensorTimeout(self.id);
            if !self.faults.is_active(kind) {
                self.faults.set(kind);
            }
        }
    }

    fn accept(&mut self, mm: u16, now_ms: u64) {
        self.history.copy_within(0..HISTORY_LEN - 1, 1);
        self.history[0] = mm;
        self.median = median_of_three(self.history);
        self.last_reading_ms = now_ms;
        if usize::from(self.readings) < HISTORY_LEN {
            self.readings += 1;
        }

        if self.state == FilterState::TimedOut {
            info!("RANGE {}: readings resumed", self.id);
            self.state = FilterState::Working;
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn is_init_error(&self) -> bool {
        self.state == FilterState::InitError
    }

    /// `true` once the history holds only real readings.
    pub fn is_primed(&self) -> bool {
        usize::from(self.readings) >= HISTORY_LEN
    }

    /// `true` when the median may drive an actuator: primed, and the device
    /// has answered within the read timeout.
    pub fn is_trusted(&self) -> bool {
        self.state == FilterState::Working && self.is_primed()
    }

    pub fn newest_reading(&self) -> u16 {
        self.history[0]
    }

    pub fn median_reading(&self) -> u16 {
        self.median
    }

    pub fn history(&self) -> [u16; HISTORY_LEN] {
        self.history
    }

    /// Store the calibrated form of the current median.
    pub fn set_linearized_median(&mut self, mm: u16) {
        self.linearized_median = mm;
    }

    pub fn linearized_median(&self) -> u16 {
        self.linearized_median
    }

    pub fn device_mut(&mut self) -> &mut S {
        &mut self.device
    }
}
