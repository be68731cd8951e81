//! System configuration parameters
//!
//! All tunable parameters for the Aqua Clock regulation core.
//! Defaults match the production hardware; the host binary can override
//! them from a JSON file.  Nothing here is clamped: out-of-range values are
//! rejected by [`SystemConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::calibration::{ColumnCalibration, DigitTables};
use crate::control::COLUMN_COUNT;
use crate::error::ConfigError;
use crate::scheduler::SleepWindow;

/// Bounds and timings for one column regulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    // --- Elevation ---
    /// Lowest commandable elevation (mm)
    pub lower_limit_mm: u16,
    /// Highest commandable elevation (mm)
    pub upper_limit_mm: u16,
    /// Half-width of the no-action band around the setpoint (mm)
    pub deadband_mm: u16,

    // --- Settle ---
    pub fill_dwell_ms: u32,
    pub drain_dwell_ms: u32,

    // --- Safety ---
    /// Longest continuous automatic fill before the column faults
    pub max_fill_ms: u32,
    /// Longest continuous automatic drain before the column faults
    pub max_drain_ms: u32,

    // --- Manual ---
    pub manual_fill_ms: u32,
    pub manual_drain_ms: u32,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            lower_limit_mm: 50,
            upper_limit_mm: 305,
            deadband_mm: 4,
            fill_dwell_ms: 1_000,
            drain_dwell_ms: 1_000,
            max_fill_ms: 60_000,
            max_drain_ms: 60_000,
            manual_fill_ms: 2_000,
            manual_drain_ms: 2_000,
        }
    }
}

impl ColumnConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lower_limit_mm >= self.upper_limit_mm {
            return Err(ConfigError::ValidationFailed(
                "column lower_limit_mm must be below upper_limit_mm",
            ));
        }
        if u32::from(self.deadband_mm) * 2 >= u32::from(self.upper_limit_mm - self.lower_limit_mm) {
            return Err(ConfigError::ValidationFailed(
                "column deadband_mm must be narrower than half the elevation span",
            ));
        }
        if self.max_fill_ms == 0 || self.max_drain_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "column max_fill_ms/max_drain_ms must be > 0",
            ));
        }
        Ok(())
    }
}

/// Reservoir pump timings and switch wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservoirConfig {
    /// Minimum interval between state-machine steps
    pub step_period_ms: u32,
    /// Pump-off dwell after a fill
    pub settle_ms: u32,
    /// Longest continuous automatic pump run before faulting
    pub max_pump_ms: u32,
    pub manual_fill_ms: u32,
    /// Level switches read low when wet
    pub switches_active_low: bool,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            step_period_ms: 10,
            settle_ms: 1_000,
            max_pump_ms: 30_000,
            manual_fill_ms: 2_000,
            switches_active_low: true,
        }
    }
}

impl ReservoirConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_period_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "reservoir step_period_ms must be > 0",
            ));
        }
        if self.max_pump_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "reservoir max_pump_ms must be > 0",
            ));
        }
        Ok(())
    }
}

/// Range sensor health monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilterConfig {
    /// No reading for longer than this raises a sensor timeout
    pub read_timeout_ms: u32,
}

impl Default for RangeFilterConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 200,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Regulation ---
    pub columns: [ColumnConfig; COLUMN_COUNT],
    pub reservoir: ReservoirConfig,
    pub range: RangeFilterConfig,

    // --- Calibration ---
    pub calibration: [ColumnCalibration; COLUMN_COUNT],
    pub digits: DigitTables,

    // --- Clock face ---
    pub sleep: SleepWindow,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_interval_ms: u32,
    /// Telemetry report interval (milliseconds)
    pub telemetry_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            columns: [ColumnConfig::default(); COLUMN_COUNT],
            reservoir: ReservoirConfig::default(),
            range: RangeFilterConfig::default(),
            calibration: core::array::from_fn(|_| ColumnCalibration::default()),
            digits: DigitTables::default(),
            sleep: SleepWindow::default(),
            control_interval_ms: 10,     // 100 Hz
            telemetry_interval_ms: 60_000, // 1/min
        }
    }
}

impl SystemConfig {
    /// Check cross-field invariants.  Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for column in &self.columns {
            column.validate()?;
        }
        self.reservoir.validate()?;

        if self.range.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "range read_timeout_ms must be > 0",
            ));
        }
        if self.calibration.iter().any(|c| !c.linearizer.is_valid()) {
            return Err(ConfigError::ValidationFailed(
                "calibration tables need >= 2 points with increasing raw_mm",
            ));
        }
        for (column, elevation) in self.digits.all() {
            let cfg = &self.columns[column.index()];
            if elevation < cfg.lower_limit_mm || elevation > cfg.upper_limit_mm {
                return Err(ConfigError::ValidationFailed(
                    "digit table entry outside its column's elevation limits",
                ));
            }
        }
        if !self.sleep.is_valid() {
            return Err(ConfigError::ValidationFailed(
                "sleep window times must be 00:00..=23:59",
            ));
        }
        if self.control_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "control_interval_ms must be > 0",
            ));
        }
        if self.telemetry_interval_ms < self.control_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be >= control_interval_ms",
            ));
        }
        Ok(())
    }

    /// Parse from JSON and validate.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
