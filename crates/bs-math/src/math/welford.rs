//! Single-pass running mean and variance.
//!
//! `RunningStats` keeps `O(1)` state (count, mean, sum of squared deviations)
//! and is updated with Welford's recurrence. Two accumulators can be combined
//! with the Chan et al. parallel formula, so folding a stream in batches and
//! merging the partial results gives the same moments as a single pass.

use serde::{Deserialize, Serialize};

/// Running first and second moments of a sample stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the current mean (Welford's `M2`).
    m2: f64,
}

impl RunningStats {
    /// An empty accumulator.
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Build an accumulator from a batch of samples.
    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut stats = Self::new();
        for x in samples {
            stats.push(x);
        }
        stats
    }

    /// Add one sample.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let total = self.count + other.count;
        let n = total as f64;
        let delta = other.mean - self.mean;

        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count = total;
    }

    /// Number of samples seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether no samples have been seen.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean (0.0 when empty).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, `M2 / n` (0.0 when empty).
    pub fn population_variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        // M2 can dip a hair below zero from rounding on constant input.
        (self.m2 / self.count as f64).max(0.0)
    }

    /// Unbiased sample variance, `M2 / (n - 1)` (0.0 below two samples).
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).max(0.0)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.population_variance().sqrt()
    }

    /// Population standard deviation clamped from below by `floor`.
    ///
    /// Never returns a value under `floor`, so z-scores against a constant
    /// series stay finite.
    pub fn floored_std_dev(&self, floor: f64) -> f64 {
        self.std_dev().max(floor)
    }
}

impl Extend<f64> for RunningStats {
    fn extend<T: IntoIterator<Item = f64>>(&mut self, iter: T) {
        for x in iter {
            self.push(x);
        }
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        Self::from_samples(iter)
    }
}
