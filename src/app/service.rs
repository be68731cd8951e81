//! Control service: the hexagonal core and cooperative loop driver.
//!
//! [`ControlService`] owns every range filter, every column regulator and
//! the reservoir regulator, plus the shared fault registry.  The caller
//! invokes [`tick`](ControlService::tick) once per loop iteration; nothing
//! here blocks, sleeps or spawns.
//!
//! ```text
//!  RangeDevice ×3 ──▶ ┌───────────────────────────────┐ ──▶ EventSink
//!  WallClock ───────▶ │        ControlService          │
//!  level switches ──▶ │ filters → columns → reservoir  │ ──▶ valves ×3, pump
//!                     └───────────────┬───────────────┘
//!                                     ▼
//!                              FaultRegistry (Rc)
//! ```
//!
//! Within one tick the filters run before the regulators that read them, so
//! a column always regulates on the reading taken in the same iteration.

use std::rc::Rc;

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::calibration::ColumnCalibration;
use crate::config::SystemConfig;
use crate::control::{Column, ColumnRegulator, ColumnState, ReservoirRegulator, COLUMN_COUNT};
use crate::error::{Error, SettingsError};
use crate::faults::{FaultKind, FaultRegistry};
use crate::scheduler::Cadence;
use crate::sensors::RangeSensorFilter;
use crate::settings::{self, PersistedSettings};

use super::commands::AppCommand;
use super::events::{AppEvent, ColumnTelemetry, ReservoirTelemetry, TelemetryData};
use super::ports::{ClockInputs, EventSink, RangeDevice, StorageError, StoragePort, WallClock};

// ───────────────────────────────────────────────────────────────
// Hardware bundle
// ───────────────────────────────────────────────────────────────

/// The devices behind one column.
pub struct ColumnHardware<S, V> {
    pub range: S,
    pub fill: V,
    pub drain: V,
}

/// Everything the service takes ownership of at construction.
pub struct Hardware<S, V, P, L> {
    pub columns: [ColumnHardware<S, V>; COLUMN_COUNT],
    pub pump: P,
    pub low_switch: L,
    pub high_switch: L,
}

struct ColumnChannel<S: RangeDevice, V: OutputPin> {
    column: Column,
    filter: RangeSensorFilter<S>,
    regulator: ColumnRegulator<V, V>,
    calibration: ColumnCalibration,
    override_mm: Option<u16>,
}

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<S, V, P, L>
where
    S: RangeDevice,
    V: OutputPin,
    P: OutputPin,
    L: InputPin,
{
    config: SystemConfig,
    faults: Rc<FaultRegistry>,
    columns: [ColumnChannel<S, V>; COLUMN_COUNT],
    reservoir: ReservoirRegulator<P, L>,
    telemetry: Cadence,
    last_clock: ClockInputs,
    /// Setpoints captured while awake, held through the sleep window.
    awake_setpoints: Option<[u16; COLUMN_COUNT]>,
    sleeping: bool,
    last_fault_bits: u32,
    tick_count: u64,
}

impl<S, V, P, L> ControlService<S, V, P, L>
where
    S: RangeDevice,
    V: OutputPin,
    P: OutputPin,
    L: InputPin,
{
    /// Construct the service.  Valves and pump are driven off here; range
    /// sensors are not started until [`start`](Self::start).
    pub fn new(config: SystemConfig, hw: Hardware<S, V, P, L>) -> Self {
        let faults = Rc::new(FaultRegistry::new());

        let mut idx = 0;
        let columns = hw.columns.map(|h| {
            let column = Column::ALL[idx];
            idx += 1;
            ColumnChannel {
                column,
                filter: RangeSensorFilter::new(
                    column.device_id(),
                    h.range,
                    faults.clone(),
                    config.range.read_timeout_ms,
                ),
                regulator: ColumnRegulator::new(
                    column.device_id(),
                    config.columns[column.index()],
                    h.fill,
                    h.drain,
                    faults.clone(),
                ),
                calibration: config.calibration[column.index()].clone(),
                override_mm: None,
            }
        });

        let reservoir = ReservoirRegulator::new(
            config.reservoir,
            hw.pump,
            hw.low_switch,
            hw.high_switch,
            faults.clone(),
        );

        let last_clock = ClockInputs {
            setpoints: config.digits.setpoints_for(12, 0),
            sleeping: false,
        };

        Self {
            telemetry: Cadence::new(config.telemetry_interval_ms),
            config,
            faults,
            columns,
            reservoir,
            last_clock,
            awake_setpoints: None,
            sleeping: false,
            last_fault_bits: 0,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start every range sensor.
    ///
    /// A sensor that fails to boot is recorded as a fault and its column is
    /// held safe for the rest of the run; the remaining columns still
    /// start.  The first failure is returned so the caller can report it.
    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Result<(), Error> {
        let mut first_err = None;
        let mut online = 0u8;
        for ch in &mut self.columns {
            match ch.filter.start(now_ms) {
                Ok(()) => online += 1,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        info!("ControlService started, {online}/{COLUMN_COUNT} range sensors online");
        self.config.sleep.log_summary();
        sink.emit(&AppEvent::Started { sensors_online: online });
        self.publish_fault_changes(sink);

        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Sample the wall clock.  On a failed read the clock fault is raised
    /// and the previous inputs are reused.
    pub fn read_clock(&mut self, clock: &mut impl WallClock) -> ClockInputs {
        match clock.time_of_day() {
            Some(t) if t.is_valid() => {
                self.last_clock = ClockInputs::from_time(t, &self.config.digits, &self.config.sleep);
            }
            _ => self.faults.set(FaultKind::ClockRead),
        }
        self.last_clock
    }

    /// Run one control cycle: filters → columns → reservoir → telemetry.
    pub fn tick(&mut self, now_ms: u64, clock: &ClockInputs, sink: &mut impl EventSink) {
        self.tick_count += 1;

        if clock.sleeping != self.sleeping {
            info!("Clock face {}", if clock.sleeping { "asleep" } else { "awake" });
            self.sleeping = clock.sleeping;
            sink.emit(&AppEvent::SleepChanged(clock.sleeping));
        }
        if !clock.sleeping || self.awake_setpoints.is_none() {
            self.awake_setpoints = Some(clock.setpoints);
        }
        let setpoints = self.awake_setpoints.unwrap_or(clock.setpoints);

        // 1. Range filters
        for ch in &mut self.columns {
            ch.filter.update(now_ms);
            let distance = ch.calibration.linearize(ch.filter.median_reading());
            ch.filter.set_linearized_median(distance);
        }

        // 2. Column regulators
        let mut any_busy = false;
        for ch in &mut self.columns {
            let prev = ch.regulator.state();
            if ch.filter.is_trusted() {
                let elevation = ch.calibration.elevation_mm(ch.filter.linearized_median());
                let setpoint = ch.override_mm.unwrap_or(setpoints[ch.column.index()]);
                any_busy |= ch.regulator.update(now_ms, elevation, setpoint);
            } else {
                // Dead, stalled or not yet primed: the median is stale or
                // zero-filled, so hold the valves shut until readings return.
                ch.regulator.halt(now_ms);
            }
            let next = ch.regulator.state();
            if next != prev {
                sink.emit(&AppEvent::ColumnStateChanged {
                    column: ch.column,
                    from: prev,
                    to: next,
                });
            }
        }

        // 3. Reservoir
        let prev = self.reservoir.state();
        self.reservoir.set_hold_off(any_busy);
        self.reservoir.update(now_ms);
        let next = self.reservoir.state();
        if next != prev {
            sink.emit(&AppEvent::ReservoirStateChanged { from: prev, to: next });
        }

        self.publish_fault_changes(sink);

        // 4. Telemetry
        if self.telemetry.ready(now_ms) {
            sink.emit(&AppEvent::Telemetry(self.build_telemetry(now_ms)));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (menu UI, console, tests).
    pub fn handle_command(&mut self, now_ms: u64, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::SetColumnEnable { column, enabled } => {
                self.channel_mut(column).regulator.set_enabled(enabled);
            }
            AppCommand::SetReservoirEnable(enabled) => {
                self.reservoir.set_enabled(enabled);
            }
            AppCommand::SetAllEnable(enabled) => {
                for ch in &mut self.columns {
                    ch.regulator.set_enabled(enabled);
                }
                self.reservoir.set_enabled(enabled);
            }
            AppCommand::ManualFill { column, duration_ms } => {
                let ch = self.channel_mut(column);
                if let Some(reason) = Self::manual_refusal(ch) {
                    warn!("Manual fill on {column} refused: {reason}");
                    sink.emit(&AppEvent::CommandRejected { reason });
                } else if !ch.regulator.request_manual_fill(duration_ms) {
                    sink.emit(&AppEvent::CommandRejected {
                        reason: "column faulted, reset first",
                    });
                }
            }
            AppCommand::ManualDrain { column, duration_ms } => {
                let ch = self.channel_mut(column);
                if let Some(reason) = Self::manual_refusal(ch) {
                    warn!("Manual drain on {column} refused: {reason}");
                    sink.emit(&AppEvent::CommandRejected { reason });
                } else if !ch.regulator.request_manual_drain(duration_ms) {
                    sink.emit(&AppEvent::CommandRejected {
                        reason: "column faulted, reset first",
                    });
                }
            }
            AppCommand::ManualPump { duration_ms } => {
                if !self.reservoir.request_manual_fill(duration_ms) {
                    sink.emit(&AppEvent::CommandRejected {
                        reason: "reservoir faulted, reset first",
                    });
                }
            }
            AppCommand::OverrideSetpoint { column, setpoint_mm } => {
                let limits = self.config.columns[column.index()];
                match setpoint_mm {
                    Some(mm) if mm < limits.lower_limit_mm || mm > limits.upper_limit_mm => {
                        warn!("Override {mm} mm for {column} outside limits");
                        sink.emit(&AppEvent::CommandRejected {
                            reason: "override outside column limits",
                        });
                    }
                    _ => {
                        info!("Column {column} override: {:?}", setpoint_mm);
                        self.channel_mut(column).override_mm = setpoint_mm;
                    }
                }
            }
            AppCommand::SetSleepWindow(window) => {
                if window.is_valid() {
                    self.config.sleep = window;
                    window.log_summary();
                } else {
                    sink.emit(&AppEvent::CommandRejected {
                        reason: "sleep window time out of range",
                    });
                }
            }
            AppCommand::ClearFault(kind) => self.faults.clear(kind),
            AppCommand::ClearAllFaults => self.faults.clear_all(),
            AppCommand::ResetColumn(column) => {
                let ch = self.channel_mut(column);
                let prev = ch.regulator.state();
                ch.regulator.reset(now_ms);
                self.faults.clear(FaultKind::ActuatorTimeout(column.device_id()));
                if prev != ColumnState::Idle && self.channel(column).regulator.state() == ColumnState::Idle {
                    sink.emit(&AppEvent::ColumnStateChanged {
                        column,
                        from: prev,
                        to: ColumnState::Idle,
                    });
                }
            }
            AppCommand::ResetReservoir => {
                let prev = self.reservoir.state();
                self.reservoir.reset(now_ms);
                self.faults.clear(FaultKind::ReservoirFillTimeout);
                let next = self.reservoir.state();
                if next != prev {
                    sink.emit(&AppEvent::ReservoirStateChanged { from: prev, to: next });
                }
            }
        }
        self.publish_fault_changes(sink);
    }

    // ── Persisted settings ────────────────────────────────────

    /// Current operator settings, for the settings store.
    pub fn settings(&self) -> PersistedSettings {
        PersistedSettings {
            wake: self.config.sleep.wake,
            sleep: self.config.sleep.sleep,
            overrides: core::array::from_fn(|i| self.columns[i].override_mm),
        }
    }

    /// Apply settings handed back by the store.
    pub fn apply_settings(&mut self, s: &PersistedSettings) -> Result<(), SettingsError> {
        s.check(&self.config)?;
        self.config.sleep = s.window();
        for (ch, mm) in self.columns.iter_mut().zip(s.overrides) {
            ch.override_mm = mm;
        }
        info!("Settings applied");
        Ok(())
    }

    /// Restore settings from storage.  A missing blob keeps the defaults;
    /// any other failure raises the storage fault.
    pub fn load_settings(&mut self, store: &impl StoragePort) -> Result<(), Error> {
        let mut buf = [0u8; settings::MAX_ENCODED_LEN];
        let len = match store.read(settings::NAMESPACE, settings::KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                info!("No stored settings, using defaults");
                return Ok(());
            }
            Err(e) => {
                warn!("Settings read failed: {e}");
                self.faults.set(FaultKind::StorageFailure);
                return Err(SettingsError::Decode.into());
            }
        };
        let decoded = PersistedSettings::decode(&buf[..len], &self.config)
            .and_then(|s| self.apply_settings(&s));
        if let Err(e) = decoded {
            warn!("Stored settings rejected: {e}");
            self.faults.set(FaultKind::StorageFailure);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn save_settings(&self, store: &mut impl StoragePort) -> Result<(), Error> {
        let bytes = self.settings().encode()?;
        if let Err(e) = store.write(settings::NAMESPACE, settings::KEY, &bytes) {
            warn!("Settings write failed: {e}");
            self.faults.set(FaultKind::StorageFailure);
            return Err(SettingsError::Encode.into());
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn build_telemetry(&self, now_ms: u64) -> TelemetryData {
        TelemetryData {
            uptime_ms: now_ms,
            columns: core::array::from_fn(|i| {
                let ch = &self.columns[i];
                ColumnTelemetry {
                    state: ch.regulator.state(),
                    sensor: ch.filter.state(),
                    raw_mm: ch.filter.median_reading(),
                    elevation_mm: ch.regulator.elevation_mm(),
                    setpoint_mm: ch.regulator.setpoint_mm(),
                    error: ch.regulator.control_error(),
                    enabled: ch.regulator.is_enabled(),
                    override_mm: ch.override_mm,
                }
            }),
            reservoir: ReservoirTelemetry {
                state: self.reservoir.state(),
                above_low: self.reservoir.above_low(),
                above_high: self.reservoir.above_high(),
                pumping: self.reservoir.pump().is_running(),
                enabled: self.reservoir.is_enabled(),
            },
            sleeping: self.sleeping,
            fault_bits: self.faults.bits(),
        }
    }

    /// Shared fault registry, for collaborators that raise their own faults.
    pub fn faults(&self) -> &Rc<FaultRegistry> {
        &self.faults
    }

    pub fn column_state(&self, column: Column) -> ColumnState {
        self.channel(column).regulator.state()
    }

    pub fn column(&self, column: Column) -> &ColumnRegulator<V, V> {
        &self.channel(column).regulator
    }

    pub fn sensor(&self, column: Column) -> &RangeSensorFilter<S> {
        &self.channel(column).filter
    }

    pub fn reservoir(&self) -> &ReservoirRegulator<P, L> {
        &self.reservoir
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Setpoint a column is being driven to, before clamping.
    pub fn target_setpoint(&self, column: Column) -> u16 {
        let ch = self.channel(column);
        ch.override_mm.unwrap_or_else(|| {
            self.awake_setpoints.unwrap_or(self.last_clock.setpoints)[column.index()]
        })
    }

    // ── Internal ──────────────────────────────────────────────

    fn channel(&self, column: Column) -> &ColumnChannel<S, V> {
        &self.columns[column.index()]
    }

    fn channel_mut(&mut self, column: Column) -> &mut ColumnChannel<S, V> {
        &mut self.columns[column.index()]
    }

    /// Why a column cannot take a manual actuation now, if it cannot.
    /// Mirrors the halt condition in [`tick`](Self::tick).
    fn manual_refusal(ch: &ColumnChannel<S, V>) -> Option<&'static str> {
        if ch.filter.is_init_error() {
            Some("column sensor failed to start")
        } else if !ch.filter.is_trusted() {
            Some("column sensor not reporting")
        } else {
            None
        }
    }

    /// Emit one event per fault bit that changed since the last call.
    fn publish_fault_changes(&mut self, sink: &mut impl EventSink) {
        let bits = self.faults.bits();
        let changed = bits ^ self.last_fault_bits;
        if changed == 0 {
            return;
        }
        for bit in 0..32 {
            if changed & (1 << bit) == 0 {
                continue;
            }
            if let Some(kind) = FaultKind::from_bit(bit) {
                if bits & (1 << bit) != 0 {
                    sink.emit(&AppEvent::FaultRaised(kind));
                } else {
                    sink.emit(&AppEvent::FaultCleared(kind));
                }
            }
        }
        self.last_fault_bits = bits;
    }
}
