//! Engine tuning parameters.
//!
//! Every field has a default, so an empty object (or no file at all) yields
//! a working configuration. Unknown fields are rejected to catch typos.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Top-level `birdstream.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub baseline: BaselineConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub window: WindowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            schema_version: default_schema_version(),
            baseline: BaselineConfig::default(),
            classifier: ClassifierConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Shape errors only; call
    /// [`crate::validate_config`] for semantic checks.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

/// Per-key running baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineConfig {
    /// Historical samples a key needs before live counts are classified.
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Lower bound applied to the standard deviation.
    #[serde(default = "default_std_dev_floor")]
    pub std_dev_floor: f64,

    /// Publish mean/stddev every N samples (1 = every sample).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            min_samples: default_min_samples(),
            std_dev_floor: default_std_dev_floor(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

/// Z-score thresholds for live classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Counts with |z| strictly above this are anomalous.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Anomalies with |z| strictly above this are HIGH severity.
    #[serde(default = "default_high_severity_z")]
    pub high_severity_z: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            z_threshold: default_z_threshold(),
            high_severity_z: default_high_severity_z(),
        }
    }
}

/// Tumbling volume windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Alert when a window holds more observations than this.
    #[serde(default = "default_max_observations")]
    pub max_observations: u64,

    /// Alert when a window's summed count exceeds this.
    #[serde(default = "default_max_total_count")]
    pub max_total_count: u64,

    /// Alert when the per-observation average exceeds this.
    #[serde(default = "default_max_average_count")]
    pub max_average_count: f64,

    /// Emit at most one alert per window instead of one per qualifying
    /// accumulation.
    #[serde(default)]
    pub dedupe_per_window: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            duration_secs: default_duration_secs(),
            max_observations: default_max_observations(),
            max_total_count: default_max_total_count(),
            max_average_count: default_max_average_count(),
            dedupe_per_window: false,
        }
    }
}

impl WindowConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_min_samples() -> u64 {
    20
}

fn default_std_dev_floor() -> f64 {
    0.5
}

fn default_refresh_interval() -> u64 {
    1
}

fn default_z_threshold() -> f64 {
    3.0
}

fn default_high_severity_z() -> f64 {
    5.0
}

fn default_duration_secs() -> u64 {
    300
}

fn default_max_observations() -> u64 {
    10
}

fn default_max_total_count() -> u64 {
    100
}

fn default_max_average_count() -> f64 {
    20.0
}
