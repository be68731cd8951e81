//! Column calibration tables.
//!
//! Two tables per installation:
//!
//! - [`Linearizer`]: piecewise-linear correction of the raw range reading
//!   (x = raw sensor distance, y = true distance, both mm).  Readings
//!   outside the table clamp to the end points.
//! - [`DigitTables`]: for each clock digit, the column elevation that puts
//!   the float on that digit's mark.
//!
//! Range sensors sit above the columns looking down, so a larger distance
//! means a lower water surface.  [`ColumnCalibration::elevation_mm`] turns
//! a corrected distance into an elevation above the column floor.

use serde::{Deserialize, Serialize};

use crate::control::{Column, COLUMN_COUNT};

/// Maximum breakpoints in one linearisation table.
pub const MAX_CAL_POINTS: usize = 8;

/// One breakpoint of the linearisation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalPoint {
    pub raw_mm: u16,
    pub actual_mm: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linearizer {
    points: heapless::Vec<CalPoint, MAX_CAL_POINTS>,
}

impl Linearizer {
    /// Build from breakpoints.  `None` if fewer than two points, more than
    /// [`MAX_CAL_POINTS`], or `raw_mm` is not strictly increasing.
    pub fn new(points: &[CalPoint]) -> Option<Self> {
        if points.len() < 2 || points.windows(2).any(|w| w[0].raw_mm >= w[1].raw_mm) {
            return None;
        }
        let points = heapless::Vec::from_slice(points).ok()?;
        Some(Self { points })
    }

    /// Unity table (output = input) over the sensor's short-range span.
    pub fn identity() -> Self {
        let mut points = heapless::Vec::new();
        for mm in [0u16, 50, 100, 150, 200, 250, 305] {
            let _ = points.push(CalPoint { raw_mm: mm, actual_mm: mm });
        }
        Self { points }
    }

    pub fn points(&self) -> &[CalPoint] {
        &self.points
    }

    /// True when the breakpoints satisfy the constructor's rules.
    /// A deserialised table bypasses [`new`](Self::new), hence this check.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2 && self.points.windows(2).all(|w| w[0].raw_mm < w[1].raw_mm)
    }

    /// Interpolate a raw reading.
    pub fn apply(&self, raw_mm: u16) -> u16 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return raw_mm;
        };
        if raw_mm <= first.raw_mm {
            return first.actual_mm;
        }
        if raw_mm >= last.raw_mm {
            return last.actual_mm;
        }

        for w in self.points.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            if raw_mm <= hi.raw_mm {
                let dx = i32::from(hi.raw_mm) - i32::from(lo.raw_mm);
                let dy = i32::from(hi.actual_mm) - i32::from(lo.actual_mm);
                let t = i32::from(raw_mm) - i32::from(lo.raw_mm);
                let y = i32::from(lo.actual_mm) + dy * t / dx;
                return y.clamp(0, i32::from(u16::MAX)) as u16;
            }
        }
        last.actual_mm
    }
}

impl Default for Linearizer {
    fn default() -> Self {
        Self::identity()
    }
}

/// Per-column conversion from raw distance to elevation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCalibration {
    /// Distance from the sensor face to the column floor.
    pub mount_height_mm: u16,
    pub linearizer: Linearizer,
}

impl Default for ColumnCalibration {
    fn default() -> Self {
        Self {
            mount_height_mm: 355,
            linearizer: Linearizer::identity(),
        }
    }
}

impl ColumnCalibration {
    /// Corrected distance for a raw reading.
    pub fn linearize(&self, raw_mm: u16) -> u16 {
        self.linearizer.apply(raw_mm)
    }

    /// Elevation for an already-corrected distance.
    pub fn elevation_mm(&self, distance_mm: u16) -> u16 {
        self.mount_height_mm.saturating_sub(distance_mm)
    }
}

/// Digit → elevation tables, one per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitTables {
    /// Hours 1..=12, index = hour - 1.
    pub hour: [u16; 12],
    /// Tens of minutes 0..=5.
    pub tens_of_minutes: [u16; 6],
    /// Minutes 0..=9.
    pub minutes: [u16; 10],
}

impl Default for DigitTables {
    fn default() -> Self {
        Self {
            hour: [53, 73, 96, 116, 136, 156, 176, 198, 218, 238, 261, 299],
            tens_of_minutes: [57, 107, 150, 190, 230, 295],
            minutes: [52, 75, 100, 131, 160, 190, 208, 230, 265, 305],
        }
    }
}

impl DigitTables {
    /// Column setpoints for a 24-hour wall-clock time.
    ///
    /// The hour column shows a 12-hour face: 0 and 12 both map to 12.
    pub fn setpoints_for(&self, hour: u8, minute: u8) -> [u16; COLUMN_COUNT] {
        let h12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        let minute = minute.min(59);

        let mut out = [0u16; COLUMN_COUNT];
        out[Column::Hour.index()] = self.hour[(h12 - 1) as usize];
        out[Column::TensOfMinutes.index()] = self.tens_of_minutes[(minute / 10) as usize];
        out[Column::Minutes.index()] = self.minutes[(minute % 10) as usize];
        out
    }

    /// Every entry, for range validation.
    pub fn all(&self) -> impl Iterator<Item = (Column, u16)> + '_ {
        self.hour
            .iter()
            .map(|v| (Column::Hour, *v))
            .chain(self.tens_of_minutes.iter().map(|v| (Column::TensOfMinutes, *v)))
            .chain(self.minutes.iter().map(|v| (Column::Minutes, *v)))
    }
}
