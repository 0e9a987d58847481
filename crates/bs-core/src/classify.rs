//! Live-count classification against learned baselines.

use std::sync::Arc;

use bs_common::{AlertRecord, Severity, SpeciesKey};
use bs_config::ClassifierConfig;
use bs_math::{abs_z_score, round_to};
use chrono::{DateTime, Utc};

use crate::baseline::{BaselineState, BaselineStore};

/// Why a live count was not scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEvaluatedReason {
    /// No historical observation has been seen for the key.
    NoBaseline,
    /// The key is still warming up.
    InsufficientSamples { have: u64, need: u64 },
}

impl std::fmt::Display for NotEvaluatedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotEvaluatedReason::NoBaseline => write!(f, "no baseline"),
            NotEvaluatedReason::InsufficientSamples { have, need } => {
                write!(f, "insufficient samples ({}/{})", have, need)
            }
        }
    }
}

/// Outcome of classifying one live count.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The baseline cannot support a judgement yet.
    NotEvaluated(NotEvaluatedReason),
    /// Within the threshold. `z_score` is rounded to two decimals.
    Normal { z_score: f64 },
    /// Beyond the threshold, with the alert to hand to sinks.
    Anomalous { alert: AlertRecord },
}

impl Classification {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Classification::Anomalous { .. })
    }

    pub fn is_evaluated(&self) -> bool {
        !matches!(self, Classification::NotEvaluated(_))
    }

    /// Rounded z-score, when the count was evaluated.
    pub fn z_score(&self) -> Option<f64> {
        match self {
            Classification::NotEvaluated(_) => None,
            Classification::Normal { z_score } => Some(*z_score),
            Classification::Anomalous { alert } => alert.z_score,
        }
    }

    pub fn into_alert(self) -> Option<AlertRecord> {
        match self {
            Classification::Anomalous { alert } => Some(alert),
            _ => None,
        }
    }
}

/// Scores live counts against a shared [`BaselineStore`].
///
/// Reads a snapshot of the key's baseline and never mutates it, so any
/// number of threads can classify concurrently with ongoing learning.
#[derive(Debug, Clone)]
pub struct AnomalyClassifier {
    store: Arc<BaselineStore>,
    config: ClassifierConfig,
}

impl AnomalyClassifier {
    pub fn new(store: Arc<BaselineStore>, config: ClassifierConfig) -> Self {
        AnomalyClassifier { store, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `count` for `key`, stamping any alert with the current time.
    pub fn classify(&self, key: &SpeciesKey, count: f64) -> Classification {
        self.classify_at(key, count, Utc::now())
    }

    /// Classify `count` for `key`, stamping any alert with `at`.
    pub fn classify_at(&self, key: &SpeciesKey, count: f64, at: DateTime<Utc>) -> Classification {
        match self.store.snapshot(key) {
            None => Classification::NotEvaluated(NotEvaluatedReason::NoBaseline),
            Some(state) if !state.ready => {
                Classification::NotEvaluated(NotEvaluatedReason::InsufficientSamples {
                    have: state.sample_count,
                    need: self.store.min_samples(),
                })
            }
            Some(state) => self.score(key, count, &state, at),
        }
    }

    fn score(
        &self,
        key: &SpeciesKey,
        count: f64,
        state: &BaselineState,
        at: DateTime<Utc>,
    ) -> Classification {
        let z = abs_z_score(count, state.mean, state.std_dev);
        let z_score = round_to(z, 2);

        if z.is_nan() || z <= self.config.z_threshold {
            return Classification::Normal { z_score };
        }

        let severity = if z > self.config.high_severity_z {
            Severity::High
        } else {
            Severity::Medium
        };
        let alert = AlertRecord::unusual_count(key.clone(), count, state.mean, z_score, severity, at);
        Classification::Anomalous { alert }
    }
}
