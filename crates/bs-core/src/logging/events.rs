//! Structured event vocabulary for logging.
//!
//! Every event carries the run's correlation IDs and the pipeline stage that
//! produced it, so JSONL logs can be grouped without parsing messages.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading and parsing input records.
    Ingest,
    /// Historical samples feeding per-key statistics.
    Baseline,
    /// Live counts scored against baselines.
    Classify,
    /// Tumbling-window volume checks.
    Window,
    /// Handing alerts to sinks.
    Emit,
    /// Draining workers and reporting.
    Shutdown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Ingest => "ingest",
            Stage::Baseline => "baseline",
            Stage::Classify => "classify",
            Stage::Window => "window",
            Stage::Emit => "emit",
            Stage::Shutdown => "shutdown",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    // Ingest
    pub const RECORD_REJECTED: &str = "record.rejected";
    pub const WINDOW_RETIRED: &str = "window.retired";

    // Detection
    pub const BASELINE_READY: &str = "baseline.ready";
    pub const CLASSIFY_NOT_EVALUATED: &str = "classify.not_evaluated";
    pub const ALERT_EMITTED: &str = "alert.emitted";
    pub const WINDOW_LATE: &str = "window.late";

    // Errors
    pub const SINK_FAILED: &str = "sink.failed";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation IDs shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Fresh IDs for the current process.
    pub fn for_current_run() -> Self {
        LogContext::new(super::generate_run_id(), super::get_host_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Ingest,
            Stage::Baseline,
            Stage::Classify,
            Stage::Window,
            Stage::Emit,
            Stage::Shutdown,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_event_names_are_dotted() {
        assert_eq!(event_names::RUN_STARTED, "run.started");
        assert_eq!(event_names::RECORD_REJECTED, "record.rejected");
        assert_eq!(event_names::BASELINE_READY, "baseline.ready");
        assert_eq!(event_names::ALERT_EMITTED, "alert.emitted");
    }

    #[test]
    fn test_context_for_current_run() {
        let ctx = LogContext::for_current_run();
        assert!(ctx.run_id.starts_with("run-"));
        assert!(ctx.host_id.starts_with("host-"));
    }
}
