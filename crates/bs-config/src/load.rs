//! Configuration loading with provenance.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::EngineConfig;
use crate::resolve::{resolve_config, ConfigSource};
use crate::snapshot::ConfigSnapshot;
use crate::validate::{validate_config, ValidationError};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound { .. } => 11,
            ConfigError::ParseError { source, .. } => source.code(),
            ConfigError::ValidationError(e) => e.code(),
            ConfigError::IoError { .. } => 60,
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Validated configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EngineConfig,
    /// File the config was read from (None when using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// Built-in defaults, no file involved.
    pub fn builtin() -> Self {
        ResolvedConfig {
            config: EngineConfig::default(),
            path: None,
            source: ConfigSource::BuiltinDefault,
        }
    }

    /// Create a config snapshot for the run summary.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::capture(&self.config, self.path.as_deref(), self.source)
    }
}

/// Load configuration with the standard resolution order, then validate it.
///
/// A file that was resolved but fails to parse or validate is an error; it
/// never silently falls back to defaults.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let resolved = resolve_config(options.config_path.as_deref());

    let Some(path) = resolved.path else {
        let defaults = ResolvedConfig::builtin();
        validate_config(&defaults.config)?;
        return Ok(defaults);
    };

    let config = load_from_file(&path)?;
    validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path: Some(path),
        source: resolved.source,
    })
}

fn load_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    EngineConfig::from_json(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}
