//! Fuzz target feeding arbitrary observation sequences through the engine.
//!
//! Checks that baselines never publish a deviation below the floor and that
//! window alerts only fire for buckets over threshold.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use bs_common::{AlertType, Observation, ObservationClass, SpeciesKey};
use bs_config::EngineConfig;
use bs_core::alert::CollectingEmitter;
use bs_core::engine::Engine;
use bs_core::logging::LogContext;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Step {
    species: u8,
    location: u8,
    count: u16,
    offset_secs: u32,
    historical: bool,
}

fuzz_target!(|steps: Vec<Step>| {
    let config = EngineConfig::default();
    let sink = Arc::new(CollectingEmitter::new());
    let engine = Engine::new(&config, sink.clone(), LogContext::new("run-fuzz", "host-fuzz"));

    for step in &steps {
        let key = SpeciesKey::new(format!("s{}", step.species % 4), format!("l{}", step.location % 4));
        let Some(ts) = DateTime::<Utc>::from_timestamp(i64::from(step.offset_secs), 0) else {
            continue;
        };
        let class = if step.historical {
            ObservationClass::Historical
        } else {
            ObservationClass::Live
        };
        let obs = Observation::new(key.clone(), u64::from(step.count), ts, class);
        let _ = engine.process(&obs);

        if let Some(state) = engine.baselines().snapshot(&key) {
            assert!(state.std_dev >= config.baseline.std_dev_floor);
        }
    }

    for alert in sink.alerts() {
        if alert.alert_type == AlertType::WindowedAnomaly {
            let total = alert.window_total.unwrap_or(0);
            let n = alert.observation_count.unwrap_or(0);
            assert!(
                n > config.window.max_observations
                    || total > config.window.max_total_count
                    || (n > 0 && total as f64 / n as f64 > config.window.max_average_count)
            );
        }
    }
});
