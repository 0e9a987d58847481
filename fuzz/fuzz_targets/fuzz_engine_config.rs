//! Fuzz target for birdstream.json parsing and validation.

#![no_main]

use bs_config::{validate_config, EngineConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation return errors, never panic.
    if let Ok(config) = EngineConfig::from_json(data) {
        if validate_config(&config).is_ok() {
            assert!(config.baseline.min_samples >= 1);
            assert!(config.classifier.high_severity_z >= config.classifier.z_threshold);
        }
    }
});
