//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::engine::{BaselineConfig, ClassifierConfig, EngineConfig, WindowConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate an engine configuration semantically.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_baseline(&config.baseline)?;
    validate_classifier(&config.classifier)?;
    validate_window(&config.window)?;

    Ok(())
}

fn validate_baseline(baseline: &BaselineConfig) -> ValidationResult<()> {
    if baseline.min_samples < 1 {
        return Err(ValidationError::invalid(
            "baseline.min_samples",
            "Must be at least 1",
        ));
    }
    validate_positive("baseline.std_dev_floor", baseline.std_dev_floor)?;
    if baseline.refresh_interval < 1 {
        return Err(ValidationError::invalid(
            "baseline.refresh_interval",
            "Must be at least 1",
        ));
    }
    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> ValidationResult<()> {
    validate_positive("classifier.z_threshold", classifier.z_threshold)?;
    validate_positive("classifier.high_severity_z", classifier.high_severity_z)?;

    if classifier.high_severity_z < classifier.z_threshold {
        return Err(ValidationError::SemanticError(format!(
            "classifier.high_severity_z ({}) must be >= classifier.z_threshold ({})",
            classifier.high_severity_z, classifier.z_threshold
        )));
    }
    Ok(())
}

fn validate_window(window: &WindowConfig) -> ValidationResult<()> {
    if window.duration_secs == 0 {
        return Err(ValidationError::invalid(
            "window.duration_secs",
            "Must be positive",
        ));
    }
    validate_non_negative("window.max_average_count", window.max_average_count)?;
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::invalid(
            field,
            format!("Must be a positive finite number, got {}", value),
        ));
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::invalid(
            field,
            format!("Must be a non-negative finite number, got {}", value),
        ));
    }
    Ok(())
}
