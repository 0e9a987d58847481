//! Configuration snapshots for run summaries.
//!
//! A snapshot records which file (if any) supplied the configuration and
//! the values that shape detection, so a run's alerts can be explained
//! later without the original file.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::resolve::ConfigSource;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    pub schema_version: String,

    /// Path the config was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    pub source: ConfigSource,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Detection-relevant values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub min_samples: u64,
    pub std_dev_floor: f64,
    pub z_threshold: f64,
    pub high_severity_z: f64,
    pub window_secs: u64,
    pub dedupe_per_window: bool,
}

impl ConfigSnapshot {
    pub fn capture(config: &EngineConfig, path: Option<&Path>, source: ConfigSource) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: path.map(|p| p.display().to_string()),
            source,
            summary: ConfigSummary {
                min_samples: config.baseline.min_samples,
                std_dev_floor: config.baseline.std_dev_floor,
                z_threshold: config.classifier.z_threshold,
                high_severity_z: config.classifier.high_severity_z,
                window_secs: config.window.duration_secs,
                dedupe_per_window: config.window.dedupe_per_window,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_copies_detection_values() {
        let mut config = EngineConfig::default();
        config.baseline.min_samples = 50;
        config.window.dedupe_per_window = true;

        let snapshot = ConfigSnapshot::capture(
            &config,
            Some(Path::new("/tmp/birdstream.json")),
            ConfigSource::CliArgument,
        );
        assert_eq!(snapshot.summary.min_samples, 50);
        assert!(snapshot.summary.dedupe_per_window);
        assert_eq!(snapshot.path.as_deref(), Some("/tmp/birdstream.json"));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["source"], "cli_argument");
        assert_eq!(json["summary"]["window_secs"], 300);
    }
}
