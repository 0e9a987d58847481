//! Birdstream core library.
//!
//! Online per-key baselines and two independent detectors:
//! - `baseline`: Welford running statistics per `(species, location)`
//! - `classify`: z-score classification of live counts
//! - `window`: tumbling-window volume detection
//! - `engine`: routes observations through all three and delivers alerts
//! - `runner`: drives an engine from a JSONL stream with worker threads
//!
//! The binary entry point is in `main.rs`.

pub mod alert;
pub mod baseline;
pub mod classify;
pub mod engine;
pub mod exit_codes;
pub mod logging;
pub mod runner;
pub mod scorecard;
pub mod window;

pub use alert::{AlertEmitter, CollectingEmitter, FanoutEmitter, JsonlAlertWriter, NullEmitter};
pub use baseline::{BaselineState, BaselineStore, ObserveOutcome};
pub use classify::{AnomalyClassifier, Classification, NotEvaluatedReason};
pub use engine::{AlertCounts, Engine, EngineStats, ProcessOutcome};
pub use exit_codes::ExitCode;
pub use runner::{run_stream, RunOptions, RunSummary};
pub use scorecard::{DetectionScorecard, ScorecardCounters};
pub use window::{WindowAggregator, WindowBucket, WindowOutcome};
