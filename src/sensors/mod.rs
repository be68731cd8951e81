//! Sensor subsystem: range filters for the columns and level switches for
//! the reservoir.

pub mod level;
pub mod range;

pub use level::LevelSwitch;
pub use range::{FilterState, RangeSensorFilter};
