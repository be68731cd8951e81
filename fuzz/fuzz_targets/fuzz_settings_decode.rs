//! Fuzz target: `PersistedSettings::decode`
//!
//! Arbitrary bytes from the settings store must either be rejected with a
//! typed error or decode to settings that pass the range check and
//! re-encode within the storage budget.
//!
//! cargo fuzz run fuzz_settings_decode

#![no_main]

use aquaclock::config::SystemConfig;
use aquaclock::settings::{MAX_ENCODED_LEN, PersistedSettings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    if let Ok(settings) = PersistedSettings::decode(data, &config) {
        assert!(settings.check(&config).is_ok());
        let bytes = settings.encode().expect("valid settings re-encode");
        assert!(bytes.len() <= MAX_ENCODED_LEN);
    }
});
