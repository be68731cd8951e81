//! Unified error types for the Aqua Clock regulation core.
//!
//! Runtime faults never travel through these types: they are recorded in
//! the [`FaultRegistry`](crate::faults::FaultRegistry).  `Error` covers the
//! set-up paths that can refuse to proceed (sensor start, config load,
//! settings decode).  All variants are `Copy`.

use core::fmt;

use crate::faults::DeviceId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible set-up operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A range sensor could not be started.
    SensorInit(SensorInitError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Persisted settings could not be encoded or decoded.
    Settings(SettingsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorInit(e) => write!(f, "sensor: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor start-up
// ---------------------------------------------------------------------------

/// The underlying range device refused to initialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorInitError {
    pub sensor: DeviceId,
}

impl fmt::Display for SensorInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range sensor {} failed to boot", self.sensor)
    }
}

impl From<SensorInitError> for Error {
    fn from(e: SensorInitError) -> Self {
        Self::SensorInit(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration could not be accepted.
///
/// Invalid ranges are rejected, not silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed to deserialise.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Persisted settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Serialisation failed (buffer too small, etc.).
    Encode,
    /// The stored blob did not decode.
    Decode,
    /// The blob decoded but a field is out of range.
    OutOfRange(&'static str),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "encode failed"),
            Self::Decode => write!(f, "decode failed"),
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
        }
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
