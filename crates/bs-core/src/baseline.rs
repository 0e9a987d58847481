//! Per-key running baselines learned from historical observations.
//!
//! Each `(species, location)` key owns a Welford accumulator. Entries live in
//! a sharded [`DashMap`], so updates to different keys do not contend and
//! updates to the same key serialize on that key's shard guard.
//!
//! Readers see a *published* mean/stddev pair rather than the live
//! accumulator. Publication happens every `refresh_interval` samples and
//! always at the sample that makes a key ready; with the default interval of
//! 1 the published values track the accumulator exactly.

use bs_common::SpeciesKey;
use bs_config::BaselineConfig;
use bs_math::RunningStats;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Read-only view of one key's baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    /// Historical samples folded in so far.
    pub sample_count: u64,
    /// Published mean.
    pub mean: f64,
    /// Published standard deviation, never below the configured floor.
    pub std_dev: f64,
    /// True once `sample_count >= min_samples`; never reverts.
    pub ready: bool,
}

/// Result of folding one sample (or batch) into a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOutcome {
    pub sample_count: u64,
    /// This update is the one that made the key ready.
    pub became_ready: bool,
}

#[derive(Debug, Clone)]
struct BaselineEntry {
    stats: RunningStats,
    published_mean: f64,
    published_std_dev: f64,
    ready: bool,
}

impl BaselineEntry {
    fn new(floor: f64) -> Self {
        BaselineEntry {
            stats: RunningStats::new(),
            published_mean: 0.0,
            published_std_dev: floor,
            ready: false,
        }
    }

    fn publish(&mut self, floor: f64) {
        self.published_mean = self.stats.mean();
        self.published_std_dev = self.stats.floored_std_dev(floor);
    }

    fn state(&self) -> BaselineState {
        BaselineState {
            sample_count: self.stats.count(),
            mean: self.published_mean,
            std_dev: self.published_std_dev,
            ready: self.ready,
        }
    }
}

/// Concurrent map of per-key baselines.
#[derive(Debug)]
pub struct BaselineStore {
    entries: DashMap<SpeciesKey, BaselineEntry>,
    config: BaselineConfig,
}

impl Default for BaselineStore {
    fn default() -> Self {
        BaselineStore::new(BaselineConfig::default())
    }
}

impl BaselineStore {
    pub fn new(config: BaselineConfig) -> Self {
        BaselineStore {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn min_samples(&self) -> u64 {
        self.config.min_samples
    }

    /// Fold one historical count into `key`'s baseline, creating it on
    /// first use.
    pub fn observe(&self, key: &SpeciesKey, count: u64) -> ObserveOutcome {
        self.update(key, |entry| entry.stats.push(count as f64), false)
    }

    /// Fold a pre-aggregated batch into `key`'s baseline.
    ///
    /// Equivalent (within floating-point tolerance) to observing each sample
    /// of the batch. Always republishes.
    pub fn merge(&self, key: &SpeciesKey, batch: &RunningStats) -> ObserveOutcome {
        self.update(key, |entry| entry.stats.merge(batch), true)
    }

    fn update(
        &self,
        key: &SpeciesKey,
        apply: impl FnOnce(&mut BaselineEntry),
        always_publish: bool,
    ) -> ObserveOutcome {
        let floor = self.config.std_dev_floor;
        let mut entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => self
                .entries
                .entry(key.clone())
                .or_insert_with(|| BaselineEntry::new(floor)),
        };

        let before = entry.stats.count();
        apply(&mut *entry);
        let after = entry.stats.count();

        let became_ready = !entry.ready && after >= self.config.min_samples;
        if became_ready {
            entry.ready = true;
        }

        let interval = self.config.refresh_interval.max(1);
        let crossed_refresh = after / interval > before / interval;
        if always_publish || became_ready || crossed_refresh {
            entry.publish(floor);
        }

        ObserveOutcome {
            sample_count: after,
            became_ready,
        }
    }

    /// Current published state for `key`, or `None` if it has never been
    /// observed.
    pub fn snapshot(&self, key: &SpeciesKey) -> Option<BaselineState> {
        self.entries.get(key).map(|entry| entry.state())
    }

    /// Number of keys with a baseline.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys with a baseline, sorted.
    pub fn keys(&self) -> Vec<SpeciesKey> {
        let mut keys: Vec<SpeciesKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of keys whose baseline is ready.
    pub fn ready_count(&self) -> usize {
        self.entries.iter().filter(|e| e.ready).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SpeciesKey {
        SpeciesKey::new("Mourning Dove", "San Diego")
    }

    fn store(min_samples: u64) -> BaselineStore {
        BaselineStore::new(BaselineConfig {
            min_samples,
            ..BaselineConfig::default()
        })
    }

    #[test]
    fn absent_until_first_observation() {
        let store = store(3);
        assert!(store.snapshot(&key()).is_none());
        assert!(store.is_empty());

        store.observe(&key(), 5);
        let state = store.snapshot(&key()).unwrap();
        assert_eq!(state.sample_count, 1);
        assert_eq!(state.mean, 5.0);
        assert!(!state.ready);
    }

    #[test]
    fn ready_transition_happens_once() {
        let store = store(3);
        let outcomes: Vec<bool> = (0..5).map(|_| store.observe(&key(), 4).became_ready).collect();
        assert_eq!(outcomes, vec![false, false, true, false, false]);
        assert!(store.snapshot(&key()).unwrap().ready);
        assert_eq!(store.ready_count(), 1);
    }

    #[test]
    fn constant_series_uses_floor() {
        let store = store(20);
        for _ in 0..20 {
            store.observe(&key(), 10);
        }
        let state = store.snapshot(&key()).unwrap();
        assert!(state.ready);
        assert_eq!(state.mean, 10.0);
        assert_eq!(state.std_dev, 0.5);
    }

    #[test]
    fn population_std_dev() {
        let store = store(1);
        for count in [2, 4, 4, 4, 5, 5, 7, 9] {
            store.observe(&key(), count);
        }
        let state = store.snapshot(&key()).unwrap();
        assert!((state.mean - 5.0).abs() < 1e-12);
        assert!((state.std_dev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn keys_are_independent() {
        let store = store(2);
        let other = SpeciesKey::new("Mourning Dove", "Orange");
        store.observe(&key(), 10);
        store.observe(&key(), 10);
        store.observe(&other, 100);

        assert!(store.snapshot(&key()).unwrap().ready);
        assert!(!store.snapshot(&other).unwrap().ready);
        assert_eq!(store.snapshot(&other).unwrap().mean, 100.0);
        assert_eq!(store.keys(), vec![other, key()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn refresh_interval_delays_publication() {
        let store = BaselineStore::new(BaselineConfig {
            min_samples: 2,
            refresh_interval: 4,
            ..BaselineConfig::default()
        });

        store.observe(&key(), 10);
        assert_eq!(store.snapshot(&key()).unwrap().mean, 0.0);

        // Readiness forces a publish.
        store.observe(&key(), 20);
        assert_eq!(store.snapshot(&key()).unwrap().mean, 15.0);

        store.observe(&key(), 30);
        let state = store.snapshot(&key()).unwrap();
        assert_eq!(state.sample_count, 3);
        assert_eq!(state.mean, 15.0);

        store.observe(&key(), 40);
        assert_eq!(store.snapshot(&key()).unwrap().mean, 25.0);
    }

    #[test]
    fn merge_matches_sequential_observe() {
        let samples = [3u64, 8, 1, 12, 7, 7, 2];

        let sequential = store(5);
        for &c in &samples {
            sequential.observe(&key(), c);
        }

        let merged = store(5);
        merged.observe(&key(), samples[0]);
        let batch: RunningStats = samples[1..].iter().map(|&c| c as f64).collect();
        let outcome = merged.merge(&key(), &batch);
        assert!(outcome.became_ready);

        let a = sequential.snapshot(&key()).unwrap();
        let b = merged.snapshot(&key()).unwrap();
        assert_eq!(a.sample_count, b.sample_count);
        assert!((a.mean - b.mean).abs() < 1e-9);
        assert!((a.std_dev - b.std_dev).abs() < 1e-9);
    }
}
