//! Exit codes for the bs-core CLI.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use bs_common::{Error, ErrorCategory};
use bs_config::ConfigError;

/// Exit codes for bs-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Stream processed, no alerts
    Clean = 0,

    /// Stream processed, at least one alert emitted
    AlertsEmitted = 1,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Config file missing, malformed, or invalid
    ConfigError = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error (input unreadable, sink closed)
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes 0-1: the run completed.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::AlertsEmitted => "OK_ALERTS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Outcome of a completed run.
    pub fn for_alert_count(alerts: u64) -> Self {
        if alerts > 0 {
            ExitCode::AlertsEmitted
        } else {
            ExitCode::Clean
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        match error.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Input => ExitCode::ArgsError,
            ErrorCategory::Sink | ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Internal => ExitCode::InternalError,
        }
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(error: &ConfigError) -> Self {
        match error {
            ConfigError::IoError { .. } => ExitCode::IoError,
            _ => ExitCode::ConfigError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_operational());
        assert!(ExitCode::AlertsEmitted.is_operational());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert_eq!(ExitCode::ConfigError.as_i32(), 11);
    }

    #[test]
    fn test_alert_count_outcome() {
        assert_eq!(ExitCode::for_alert_count(0), ExitCode::Clean);
        assert_eq!(ExitCode::for_alert_count(3), ExitCode::AlertsEmitted);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(ExitCode::from(&Error::SinkClosed), ExitCode::IoError);
        assert_eq!(
            ExitCode::from(&Error::Internal("bug".into())),
            ExitCode::InternalError
        );
        let missing = ConfigError::NotFound {
            path: "/nope.json".into(),
        };
        assert_eq!(ExitCode::from(&missing), ExitCode::ConfigError);
    }

    #[test]
    fn test_display_includes_name_and_code() {
        assert_eq!(ExitCode::AlertsEmitted.to_string(), "OK_ALERTS (1)");
    }
}
