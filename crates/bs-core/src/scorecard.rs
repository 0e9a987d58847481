//! Detection quality against ground-truth labels.
//!
//! Synthetic producers mark injected anomalies with `isAnomaly`. When those
//! labels are present, live unusual-count decisions are tallied into a
//! confusion matrix. Only scored observations count; live observations whose
//! baseline was not ready are tallied separately.

use std::sync::atomic::{AtomicU64, Ordering};

use bs_math::checked_ratio;
use serde::{Deserialize, Serialize};

/// Lock-free tallies, shared by workers.
#[derive(Debug, Default)]
pub struct ScorecardCounters {
    true_positives: AtomicU64,
    false_positives: AtomicU64,
    true_negatives: AtomicU64,
    false_negatives: AtomicU64,
    not_evaluated: AtomicU64,
}

impl ScorecardCounters {
    /// Record one scored decision against its label.
    pub fn record(&self, predicted_anomaly: bool, labeled_anomaly: bool) {
        let counter = match (predicted_anomaly, labeled_anomaly) {
            (true, true) => &self.true_positives,
            (true, false) => &self.false_positives,
            (false, false) => &self.true_negatives,
            (false, true) => &self.false_negatives,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a labeled observation that could not be scored.
    pub fn record_not_evaluated(&self) {
        self.not_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    /// `None` when no labeled observation was seen.
    pub fn scorecard(&self) -> Option<DetectionScorecard> {
        let card = DetectionScorecard::from_counts(
            self.true_positives.load(Ordering::Relaxed),
            self.false_positives.load(Ordering::Relaxed),
            self.true_negatives.load(Ordering::Relaxed),
            self.false_negatives.load(Ordering::Relaxed),
            self.not_evaluated.load(Ordering::Relaxed),
        );
        (card.scored() + card.not_evaluated > 0).then_some(card)
    }
}

/// Confusion matrix plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionScorecard {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
    /// Labeled live observations skipped because the baseline was not ready.
    pub not_evaluated: u64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl DetectionScorecard {
    /// Metrics are 0 when undefined.
    pub fn from_counts(tp: u64, fp: u64, tn: u64, fn_: u64, not_evaluated: u64) -> Self {
        let precision = checked_ratio(tp as f64, (tp + fp) as f64).unwrap_or(0.0);
        let recall = checked_ratio(tp as f64, (tp + fn_) as f64).unwrap_or(0.0);
        let f1 = checked_ratio(2.0 * precision * recall, precision + recall).unwrap_or(0.0);
        DetectionScorecard {
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
            not_evaluated,
            precision,
            recall,
            f1,
        }
    }

    pub fn scored(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}
