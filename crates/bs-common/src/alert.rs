//! Alert records handed to external sinks.
//!
//! Both detectors produce the same flat record shape. Fields that do not
//! apply to an alert type are omitted from the serialized form, except
//! `zScore`, which is always present and `null` for windowed alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::SpeciesKey;

/// Which detector raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// A live count far from the key's learned baseline.
    UnusualCount,
    /// A tumbling window with unusually high volume.
    WindowedAnomaly,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::UnusualCount => write!(f, "unusual_count"),
            AlertType::WindowedAnomaly => write!(f, "windowed_anomaly"),
        }
    }
}

/// Alert priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// One alert, produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub alert_type: AlertType,
    #[serde(flatten)]
    pub key: SpeciesKey,
    /// `species_location` rendering of `key`, for sinks that join on one
    /// string.
    #[serde(rename = "key", default)]
    pub key_label: String,
    /// Observed live count (unusual-count alerts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_count: Option<f64>,
    /// Baseline mean rounded to the nearest bird (unusual-count alerts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<i64>,
    /// Two-decimal z-score; `null` for windowed alerts.
    pub z_score: Option<f64>,
    /// Birds counted in the window so far (windowed alerts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl AlertRecord {
    /// Build an unusual-count alert.
    ///
    /// `z_score` is stored as given; callers round it first.
    pub fn unusual_count(
        key: SpeciesKey,
        observed: f64,
        baseline_mean: f64,
        z_score: f64,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let expected = baseline_mean.round() as i64;
        let comparison = if baseline_mean > 0.0 {
            format!("{:.1}x normal", observed / baseline_mean)
        } else {
            "baseline mean is zero".to_string()
        };
        let message = format!(
            "Unusual {} count in {}: observed {}, expected ~{} ({})",
            key.species, key.location, observed, expected, comparison
        );

        AlertRecord {
            alert_type: AlertType::UnusualCount,
            key_label: key.to_string(),
            key,
            observed_count: Some(observed),
            expected_count: Some(expected),
            z_score: Some(z_score),
            window_total: None,
            observation_count: None,
            average_count: None,
            window_start: None,
            window_end: None,
            severity,
            timestamp,
            message,
        }
    }

    /// Build a windowed-volume alert from a window's contents.
    pub fn windowed(
        key: SpeciesKey,
        window_total: u64,
        observation_count: u64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let average = if observation_count > 0 {
            window_total as f64 / observation_count as f64
        } else {
            0.0
        };
        let message = format!(
            "Unusual activity in {} window for {}: {} observations, {} total birds",
            describe_span(window_end - window_start),
            key,
            observation_count,
            window_total
        );

        AlertRecord {
            alert_type: AlertType::WindowedAnomaly,
            key_label: key.to_string(),
            key,
            observed_count: None,
            expected_count: None,
            z_score: None,
            window_total: Some(window_total),
            observation_count: Some(observation_count),
            average_count: Some(average),
            window_start: Some(window_start),
            window_end: Some(window_end),
            severity: Severity::Medium,
            timestamp,
            message,
        }
    }

    /// Serialize as one JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","alertType":"{}"}}"#,
                self.alert_type
            )
        })
    }
}

fn describe_span(span: chrono::Duration) -> String {
    let secs = span.num_seconds();
    if secs > 0 && secs % 60 == 0 {
        format!("{}-min", secs / 60)
    } else {
        format!("{}-sec", secs)
    }
}
