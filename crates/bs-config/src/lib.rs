//! Birdstream configuration loading and validation.
//!
//! This crate provides:
//! - Typed structs for `birdstream.json` with per-field defaults
//! - Config resolution (CLI → env → XDG → /etc → defaults)
//! - Semantic validation with stable error codes
//! - Config snapshots for run summaries

pub mod engine;
pub mod load;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use engine::{BaselineConfig, ClassifierConfig, EngineConfig, WindowConfig};
pub use load::{load_config, ConfigError, ConfigOptions, ResolvedConfig};
pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "birdstream.json";
