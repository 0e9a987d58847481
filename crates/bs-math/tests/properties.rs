//! Property-based tests for bs-math streaming statistics.
//!
//! Uses proptest to verify the running moments behave like the exact
//! two-pass computation across many random inputs.

use bs_math::{abs_z_score, round_to, RunningStats};
use proptest::prelude::*;

/// Relative tolerance for floating point comparisons.
const TOL: f64 = 1e-9;

/// Helper to check approximate equality with a relative floor.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

fn two_pass(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

// ============================================================================
// RunningStats properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Welford agrees with the two-pass reference.
    #[test]
    fn test_running_matches_two_pass(counts in prop::collection::vec(0u32..10_000, 1..200)) {
        let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        let stats = RunningStats::from_samples(values.iter().copied());
        let (mean, var) = two_pass(&values);
        prop_assert_eq!(stats.count(), values.len() as u64);
        prop_assert!(approx_eq(stats.mean(), mean, TOL), "mean {} vs {}", stats.mean(), mean);
        prop_assert!(approx_eq(stats.population_variance(), var, 1e-6),
            "var {} vs {}", stats.population_variance(), var);
    }

    /// Arrival order does not change the moments.
    #[test]
    fn test_order_independent(counts in prop::collection::vec(0u32..5_000, 1..150)) {
        let forward = RunningStats::from_samples(counts.iter().map(|&c| c as f64));
        let reversed = RunningStats::from_samples(counts.iter().rev().map(|&c| c as f64));
        let mut sorted = counts.clone();
        sorted.sort_unstable();
        let ascending = RunningStats::from_samples(sorted.iter().map(|&c| c as f64));

        for other in [&reversed, &ascending] {
            prop_assert_eq!(forward.count(), other.count());
            prop_assert!(approx_eq(forward.mean(), other.mean(), TOL));
            prop_assert!(approx_eq(forward.population_variance(), other.population_variance(), 1e-6));
        }
    }

    /// Splitting the stream into batches and merging is equivalent to one pass.
    #[test]
    fn test_merge_equals_single_pass(
        counts in prop::collection::vec(0u32..5_000, 2..200),
        split in 0usize..200,
    ) {
        let split = split % counts.len();
        let (left, right) = counts.split_at(split);
        let mut merged = RunningStats::from_samples(left.iter().map(|&c| c as f64));
        merged.merge(&RunningStats::from_samples(right.iter().map(|&c| c as f64)));
        let single = RunningStats::from_samples(counts.iter().map(|&c| c as f64));

        prop_assert_eq!(merged.count(), single.count());
        prop_assert!(approx_eq(merged.mean(), single.mean(), TOL));
        prop_assert!(approx_eq(merged.population_variance(), single.population_variance(), 1e-6));
    }

    /// The floored deviation never drops below the floor and never hides a
    /// larger true deviation.
    #[test]
    fn test_floor_invariant(counts in prop::collection::vec(0u32..1_000, 1..100), floor in 0.01f64..5.0) {
        let stats = RunningStats::from_samples(counts.iter().map(|&c| c as f64));
        let sd = stats.floored_std_dev(floor);
        prop_assert!(sd >= floor);
        prop_assert!(sd >= stats.std_dev());
    }

    /// A constant series always lands exactly on the floor.
    #[test]
    fn test_constant_series_hits_floor(value in 0u32..100_000, n in 1usize..300) {
        let stats = RunningStats::from_samples(std::iter::repeat(value as f64).take(n));
        prop_assert_eq!(stats.mean(), value as f64);
        prop_assert_eq!(stats.floored_std_dev(0.5), 0.5);
    }
}

// ============================================================================
// Helper properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// z-score is symmetric around the mean.
    #[test]
    fn test_z_score_symmetric(mean in -1e4f64..1e4, d in 0.0f64..1e3, sd in 0.01f64..100.0) {
        let above = abs_z_score(mean + d, mean, sd);
        let below = abs_z_score(mean - d, mean, sd);
        prop_assert!(approx_eq(above, below, 1e-6));
        prop_assert!(above >= 0.0);
    }

    /// Rounding moves a value by at most half a unit in the last place kept.
    #[test]
    fn test_round_to_bounded_error(x in -1e6f64..1e6) {
        let r = round_to(x, 2);
        prop_assert!((r - x).abs() <= 0.005 + 1e-9);
    }
}
