//! Operator settings that survive a power cycle.
//!
//! The regulation core does not own storage.  It hands the settings
//! collaborator an opaque postcard blob and takes one back at start-up:
//! the sleep window edges and the per-column setpoint overrides.

use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::control::COLUMN_COUNT;
use crate::error::SettingsError;
use crate::scheduler::{SleepWindow, TimeOfDay};

/// Storage namespace and key for the settings blob.
pub const NAMESPACE: &str = "aquaclock";
pub const KEY: &str = "settings";

/// Upper bound on the encoded size.
pub const MAX_ENCODED_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub wake: TimeOfDay,
    pub sleep: TimeOfDay,
    /// Static elevation per column, `None` to follow the clock.
    pub overrides: [Option<u16>; COLUMN_COUNT],
}

impl Default for PersistedSettings {
    fn default() -> Self {
        let window = SleepWindow::default();
        Self {
            wake: window.wake,
            sleep: window.sleep,
            overrides: [None; COLUMN_COUNT],
        }
    }
}

impl PersistedSettings {
    pub fn window(&self) -> SleepWindow {
        SleepWindow {
            wake: self.wake,
            sleep: self.sleep,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SettingsError> {
        let bytes = postcard::to_allocvec(self).map_err(|_| SettingsError::Encode)?;
        if bytes.len() > MAX_ENCODED_LEN {
            return Err(SettingsError::Encode);
        }
        Ok(bytes)
    }

    /// Decode and range-check against the running configuration.
    pub fn decode(bytes: &[u8], config: &SystemConfig) -> Result<Self, SettingsError> {
        let settings: Self = postcard::from_bytes(bytes).map_err(|_| SettingsError::Decode)?;
        settings.check(config)?;
        Ok(settings)
    }

    pub fn check(&self, config: &SystemConfig) -> Result<(), SettingsError> {
        if !self.wake.is_valid() {
            return Err(SettingsError::OutOfRange("wake"));
        }
        if !self.sleep.is_valid() {
            return Err(SettingsError::OutOfRange("sleep"));
        }
        for (mm, column) in self.overrides.iter().zip(&config.columns) {
            if let Some(mm) = *mm {
                if mm < column.lower_limit_mm || mm > column.upper_limit_mm {
                    return Err(SettingsError::OutOfRange("override"));
                }
            }
        }
        Ok(())
    }
}
