//! Concurrent access to the shared stores with real threads.

use std::sync::Arc;
use std::thread;

use bs_common::{Observation, ObservationClass, SpeciesKey};
use bs_config::{BaselineConfig, EngineConfig};
use bs_core::alert::CollectingEmitter;
use bs_core::baseline::BaselineStore;
use bs_core::classify::AnomalyClassifier;
use bs_core::engine::Engine;
use bs_core::logging::LogContext;
use bs_core::window::WindowAggregator;
use chrono::{DateTime, Utc};

const THREADS: u64 = 8;
const PER_THREAD: u64 = 500;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
}

#[test]
fn same_key_updates_are_not_lost() {
    let store = BaselineStore::new(BaselineConfig::default());
    let key = SpeciesKey::new("House Finch", "Orange");

    thread::scope(|s| {
        for t in 0..THREADS {
            let store = &store;
            let key = &key;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    store.observe(key, (t * PER_THREAD + i) % 7);
                }
            });
        }
    });

    let state = store.snapshot(&key).unwrap();
    assert_eq!(state.sample_count, THREADS * PER_THREAD);
    assert!(state.ready);

    let expected_mean = (0..THREADS * PER_THREAD).map(|n| (n % 7) as f64).sum::<f64>()
        / (THREADS * PER_THREAD) as f64;
    assert!((state.mean - expected_mean).abs() < 1e-9);
}

#[test]
fn distinct_keys_proceed_independently() {
    let store = BaselineStore::new(BaselineConfig::default());

    thread::scope(|s| {
        for t in 0..THREADS {
            let store = &store;
            s.spawn(move || {
                let key = SpeciesKey::new("Wren", format!("County {t}"));
                for _ in 0..PER_THREAD {
                    store.observe(&key, t);
                }
            });
        }
    });

    assert_eq!(store.len(), THREADS as usize);
    assert_eq!(store.ready_count(), THREADS as usize);
    for t in 0..THREADS {
        let state = store
            .snapshot(&SpeciesKey::new("Wren", format!("County {t}")))
            .unwrap();
        assert_eq!(state.sample_count, PER_THREAD);
        assert_eq!(state.mean, t as f64);
    }
}

#[test]
fn classification_runs_alongside_learning() {
    let store = Arc::new(BaselineStore::new(BaselineConfig::default()));
    let classifier = AnomalyClassifier::new(Arc::clone(&store), Default::default());
    let key = SpeciesKey::new("Mourning Dove", "Kern");

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..2_000 {
                store.observe(&key, 10);
            }
        });
        s.spawn(|| {
            for _ in 0..2_000 {
                // Either not yet ready or a sound judgement; never a torn state.
                let result = classifier.classify(&key, 10.0);
                if let Some(z) = result.z_score() {
                    assert_eq!(z, 0.0);
                }
            }
        });
    });

    assert_eq!(store.snapshot(&key).unwrap().sample_count, 2_000);
}

#[test]
fn window_counts_are_exact_under_contention() {
    let windows = WindowAggregator::default();
    let key = SpeciesKey::new("Wren", "Orange");

    let alerts: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let windows = &windows;
                let key = &key;
                s.spawn(move || {
                    (0..5)
                        .filter(|_| windows.accumulate(key, 1, at(10)).alert().is_some())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    let bucket = windows.active_bucket(&key).unwrap();
    assert_eq!(bucket.observation_count, 20);
    assert_eq!(bucket.total_count, 20);
    // Observations 11 through 20 alert, whichever thread made them.
    assert_eq!(alerts, 10);
}

#[test]
fn shared_engine_across_threads() {
    let sink = Arc::new(CollectingEmitter::new());
    let engine = Engine::new(
        &EngineConfig::default(),
        sink.clone(),
        LogContext::new("run-concurrency", "host-concurrency"),
    );

    thread::scope(|s| {
        for t in 0..4 {
            let engine = &engine;
            s.spawn(move || {
                let key = SpeciesKey::new("Wren", format!("County {t}"));
                for i in 0..20 {
                    let obs = Observation::new(key.clone(), 10, at(i * 300), ObservationClass::Historical);
                    engine.process(&obs).unwrap();
                }
                let spike = Observation::new(key, 13, at(20 * 300), ObservationClass::Live);
                engine.process(&spike).unwrap();
            });
        }
    });

    let stats = engine.stats();
    assert_eq!(stats.historical, 80);
    assert_eq!(stats.live, 4);
    assert_eq!(stats.alerts.unusual_count_high, 4);
    assert_eq!(sink.len(), 4);
}
