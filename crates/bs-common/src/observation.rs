//! Engine input records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::SpeciesKey;

/// Whether an observation trains the baseline or is checked against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationClass {
    /// Feeds the per-key baseline only.
    Historical,
    /// Classified against the baseline.
    Live,
}

impl std::fmt::Display for ObservationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationClass::Historical => write!(f, "historical"),
            ObservationClass::Live => write!(f, "live"),
        }
    }
}

/// A single bird count, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: SpeciesKey,
    pub count: u64,
    pub timestamp: DateTime<Utc>,
    pub class: ObservationClass,
    /// Source record id, when the producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Ground-truth label carried by synthetic producers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labeled_anomaly: Option<bool>,
}

impl Observation {
    /// Create an unlabeled observation.
    pub fn new(key: SpeciesKey, count: u64, timestamp: DateTime<Utc>, class: ObservationClass) -> Self {
        Observation {
            key,
            count,
            timestamp,
            class,
            id: None,
            labeled_anomaly: None,
        }
    }

    /// Attach the source record id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a ground-truth anomaly label.
    pub fn with_label(mut self, labeled_anomaly: bool) -> Self {
        self.labeled_anomaly = Some(labeled_anomaly);
        self
    }

    pub fn is_historical(&self) -> bool {
        self.class == ObservationClass::Historical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let obs = Observation::new(
            SpeciesKey::new("Wren", "Orange"),
            3,
            Utc::now(),
            ObservationClass::Live,
        )
        .with_id("obs-1")
        .with_label(true);

        assert_eq!(obs.id.as_deref(), Some("obs-1"));
        assert_eq!(obs.labeled_anomaly, Some(true));
        assert!(!obs.is_historical());
    }

    #[test]
    fn class_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ObservationClass::Historical).unwrap(),
            "\"historical\""
        );
        assert_eq!(ObservationClass::Live.to_string(), "live");
    }
}
