//! Birdstream common types, keys, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Species/location keys and observation records
//! - Alert records handed to external sinks
//! - The wire-format parser used at the ingestion boundary
//! - Common error types and output formats

pub mod alert;
pub mod error;
pub mod key;
pub mod observation;
pub mod output;
pub mod record;

pub use alert::{AlertRecord, AlertType, Severity};
pub use error::{Error, ErrorCategory, Result};
pub use key::SpeciesKey;
pub use observation::{Observation, ObservationClass};
pub use output::OutputFormat;
pub use record::{ObservationRecord, RecordError};

/// Schema version for emitted alert records.
pub const SCHEMA_VERSION: &str = "1.0.0";
