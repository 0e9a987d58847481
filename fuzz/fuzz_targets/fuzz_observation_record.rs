//! Fuzz target for observation record parsing.
//!
//! Tests that `ObservationRecord::parse_line` handles arbitrary input
//! without panicking, and that accepted records satisfy the boundary checks.

#![no_main]

use bs_common::ObservationRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(obs) = ObservationRecord::parse_line(data) {
        assert!(!obs.key.species.trim().is_empty());
        assert!(!obs.key.location.trim().is_empty());
    }
});
