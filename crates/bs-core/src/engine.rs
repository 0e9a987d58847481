//! Observation routing.
//!
//! The engine owns one [`BaselineStore`], one [`AnomalyClassifier`] reading
//! from it, and one [`WindowAggregator`]. Each observation is routed:
//!
//! - historical → baseline learning
//! - live → classification against the baseline
//! - every observation → window accumulation
//!
//! The two detectors are independent; a live count can raise both an
//! unusual-count and a windowed alert. All methods take `&self`, so one
//! engine is shared by every worker thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bs_common::{AlertRecord, AlertType, Observation, Result, Severity};
use bs_config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::AlertEmitter;
use crate::baseline::{BaselineStore, ObserveOutcome};
use crate::classify::{AnomalyClassifier, Classification};
use crate::logging::{event_names, LogContext, Stage};
use crate::scorecard::{DetectionScorecard, ScorecardCounters};
use crate::window::{WindowAggregator, WindowOutcome};

/// What happened to one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Set for historical observations.
    pub baseline: Option<ObserveOutcome>,
    /// Set for live observations.
    pub classification: Option<Classification>,
    pub window: WindowOutcome,
}

impl ProcessOutcome {
    /// Alerts raised by this observation, unusual-count first.
    pub fn alerts(&self) -> Vec<&AlertRecord> {
        let unusual = match &self.classification {
            Some(Classification::Anomalous { alert }) => Some(alert),
            _ => None,
        };
        unusual.into_iter().chain(self.window.alert()).collect()
    }
}

/// Running totals, updated lock-free by workers.
#[derive(Debug, Default)]
struct EngineCounters {
    historical: AtomicU64,
    live: AtomicU64,
    not_evaluated: AtomicU64,
    late: AtomicU64,
    unusual_medium: AtomicU64,
    unusual_high: AtomicU64,
    windowed: AtomicU64,
}

/// Point-in-time copy of the engine's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub historical: u64,
    pub live: u64,
    /// Live observations whose baseline was absent or warming up.
    pub not_evaluated: u64,
    /// Observations that arrived after their window was superseded.
    pub late: u64,
    pub alerts: AlertCounts,
}

/// Alerts delivered, by type and severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub unusual_count_medium: u64,
    pub unusual_count_high: u64,
    pub windowed: u64,
}

impl AlertCounts {
    pub fn total(&self) -> u64 {
        self.unusual_count_medium + self.unusual_count_high + self.windowed
    }
}

/// Baseline learning, classification, and window detection behind one
/// entry point.
pub struct Engine {
    store: Arc<BaselineStore>,
    classifier: AnomalyClassifier,
    windows: WindowAggregator,
    emitter: Arc<dyn AlertEmitter>,
    counters: EngineCounters,
    scorecard: ScorecardCounters,
    log: LogContext,
}

impl Engine {
    pub fn new(config: &EngineConfig, emitter: Arc<dyn AlertEmitter>, log: LogContext) -> Self {
        let store = Arc::new(BaselineStore::new(config.baseline.clone()));
        let classifier = AnomalyClassifier::new(Arc::clone(&store), config.classifier.clone());
        Engine {
            store,
            classifier,
            windows: WindowAggregator::new(config.window.clone()),
            emitter,
            counters: EngineCounters::default(),
            scorecard: ScorecardCounters::default(),
            log,
        }
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.store
    }

    pub fn classifier(&self) -> &AnomalyClassifier {
        &self.classifier
    }

    pub fn windows(&self) -> &WindowAggregator {
        &self.windows
    }

    pub fn log_context(&self) -> &LogContext {
        &self.log
    }

    /// Route one observation and deliver any alerts it raises.
    ///
    /// Detection itself cannot fail; the only error is a sink that refuses
    /// an alert.
    pub fn process(&self, obs: &Observation) -> Result<ProcessOutcome> {
        let mut baseline = None;
        let mut classification = None;

        if obs.is_historical() {
            self.counters.historical.fetch_add(1, Ordering::Relaxed);
            let outcome = self.store.observe(&obs.key, obs.count);
            if outcome.became_ready {
                crate::log_event!(
                    self.log,
                    INFO,
                    event_names::BASELINE_READY,
                    Stage::Baseline,
                    format!("baseline ready for {}", obs.key),
                    samples = outcome.sample_count
                );
            }
            baseline = Some(outcome);
        } else {
            self.counters.live.fetch_add(1, Ordering::Relaxed);
            let result = self
                .classifier
                .classify_at(&obs.key, obs.count as f64, obs.timestamp);
            self.score(obs, &result);
            classification = Some(result);
        }

        let window = self.windows.accumulate(&obs.key, obs.count, obs.timestamp);
        if let WindowOutcome::Late { open_window_start } = &window {
            self.counters.late.fetch_add(1, Ordering::Relaxed);
            crate::log_event!(
                self.log,
                DEBUG,
                event_names::WINDOW_LATE,
                Stage::Window,
                format!("late observation for {} skipped by window", obs.key),
                open_window_start = tracing::field::display(open_window_start)
            );
        }

        let outcome = ProcessOutcome {
            baseline,
            classification,
            window,
        };
        for alert in outcome.alerts() {
            self.deliver(alert.clone())?;
        }
        Ok(outcome)
    }

    fn score(&self, obs: &Observation, result: &Classification) {
        if let Classification::NotEvaluated(reason) = result {
            self.counters.not_evaluated.fetch_add(1, Ordering::Relaxed);
            crate::log_event!(
                self.log,
                DEBUG,
                event_names::CLASSIFY_NOT_EVALUATED,
                Stage::Classify,
                format!("{} not evaluated: {}", obs.key, reason),
                key = tracing::field::display(&obs.key)
            );
        }
        if let Some(label) = obs.labeled_anomaly {
            if result.is_evaluated() {
                self.scorecard.record(result.is_anomalous(), label);
            } else {
                self.scorecard.record_not_evaluated();
            }
        }
    }

    fn deliver(&self, alert: AlertRecord) -> Result<()> {
        let counter = match (alert.alert_type, alert.severity) {
            (AlertType::UnusualCount, Severity::High) => &self.counters.unusual_high,
            (AlertType::UnusualCount, Severity::Medium) => &self.counters.unusual_medium,
            (AlertType::WindowedAnomaly, _) => &self.counters.windowed,
        };

        crate::log_event!(
            self.log,
            DEBUG,
            event_names::ALERT_EMITTED,
            Stage::Emit,
            alert.message.as_str(),
            alert_type = tracing::field::display(alert.alert_type),
            severity = tracing::field::display(alert.severity),
            key = tracing::field::display(&alert.key)
        );

        if let Err(e) = self.emitter.emit(alert) {
            crate::log_event!(
                self.log,
                ERROR,
                event_names::SINK_FAILED,
                Stage::Emit,
                format!("alert sink rejected alert: {}", e),
                code = e.code()
            );
            return Err(e);
        }
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drop window buckets that closed at or before `now`.
    pub fn retire_expired(&self, now: DateTime<Utc>) -> usize {
        let retired = self.windows.retire_expired(now);
        if retired > 0 {
            crate::log_event!(
                self.log,
                DEBUG,
                event_names::WINDOW_RETIRED,
                Stage::Window,
                "retired expired windows",
                retired = retired as u64
            );
        }
        retired
    }

    pub fn stats(&self) -> EngineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineStats {
            historical: load(&self.counters.historical),
            live: load(&self.counters.live),
            not_evaluated: load(&self.counters.not_evaluated),
            late: load(&self.counters.late),
            alerts: AlertCounts {
                unusual_count_medium: load(&self.counters.unusual_medium),
                unusual_count_high: load(&self.counters.unusual_high),
                windowed: load(&self.counters.windowed),
            },
        }
    }

    /// Confusion matrix over labeled live observations, if any were seen.
    pub fn scorecard(&self) -> Option<DetectionScorecard> {
        self.scorecard.scorecard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::CollectingEmitter;
    use bs_common::{ObservationClass, SpeciesKey};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn engine() -> (Engine, Arc<CollectingEmitter>) {
        let sink = Arc::new(CollectingEmitter::new());
        let engine = Engine::new(
            &EngineConfig::default(),
            sink.clone(),
            LogContext::new("run-test", "host-test"),
        );
        (engine, sink)
    }

    fn obs(count: u64, secs: i64, class: ObservationClass) -> Observation {
        Observation::new(SpeciesKey::new("Wren", "Orange"), count, at(secs), class)
    }

    #[test]
    fn historical_feeds_baseline_only() {
        let (engine, sink) = engine();
        let outcome = engine
            .process(&obs(4, 0, ObservationClass::Historical))
            .unwrap();
        assert_eq!(outcome.baseline.map(|b| b.sample_count), Some(1));
        assert!(outcome.classification.is_none());
        assert!(sink.is_empty());
        assert_eq!(engine.stats().historical, 1);
    }

    #[test]
    fn live_without_baseline_is_counted_not_evaluated() {
        let (engine, _) = engine();
        let outcome = engine.process(&obs(4, 0, ObservationClass::Live)).unwrap();
        assert!(matches!(
            outcome.classification,
            Some(Classification::NotEvaluated(_))
        ));
        assert_eq!(engine.stats().not_evaluated, 1);
    }

    #[test]
    fn not_evaluated_live_observation_is_logged() {
        use crate::logging::JsonlLayer;
        use std::io::{self, Write};
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;

        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().write(buf)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(Buffer(buffer.clone())));
        let (engine, _) = engine();
        tracing::subscriber::with_default(subscriber, || {
            engine.process(&obs(4, 0, ObservationClass::Live)).unwrap();
        });

        let output = buffer.lock().unwrap();
        let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let line = lines
            .iter()
            .find(|l| l["event"] == event_names::CLASSIFY_NOT_EVALUATED)
            .expect("not-evaluated event logged");
        assert_eq!(line["level"], "debug");
        assert_eq!(line["stage"], "classify");
        assert_eq!(line["run_id"], "run-test");
        assert_eq!(line["fields"]["key"], "Wren_Orange");
        assert_eq!(line["message"], "Wren_Orange not evaluated: no baseline");
    }

    #[test]
    fn live_spike_raises_both_alert_types() {
        let (engine, sink) = engine();
        // One historical sample per window keeps the window detector quiet.
        for i in 0..20 {
            engine
                .process(&obs(10, i * 300, ObservationClass::Historical))
                .unwrap();
        }
        let outcome = engine
            .process(&obs(150, 20 * 300, ObservationClass::Live))
            .unwrap();
        assert_eq!(outcome.alerts().len(), 2);

        let alerts = sink.alerts();
        assert_eq!(alerts[0].alert_type, AlertType::UnusualCount);
        assert_eq!(alerts[1].alert_type, AlertType::WindowedAnomaly);
        assert_eq!(alerts[0].timestamp, at(6_000));

        let stats = engine.stats();
        assert_eq!(stats.alerts.unusual_count_high, 1);
        assert_eq!(stats.alerts.windowed, 1);
        assert_eq!(stats.alerts.total(), 2);
    }

    #[test]
    fn labels_feed_scorecard() {
        let (engine, _) = engine();
        engine
            .process(&obs(10, 0, ObservationClass::Live).with_label(false))
            .unwrap();
        for i in 0..20 {
            engine
                .process(&obs(10, (i + 1) * 300, ObservationClass::Historical))
                .unwrap();
        }
        engine
            .process(&obs(13, 7_000, ObservationClass::Live).with_label(true))
            .unwrap();
        engine
            .process(&obs(10, 7_400, ObservationClass::Live).with_label(true))
            .unwrap();

        let card = engine.scorecard().unwrap();
        assert_eq!(card.not_evaluated, 1);
        assert_eq!(card.true_positives, 1);
        assert_eq!(card.false_negatives, 1);
    }

    #[test]
    fn unlabeled_streams_have_no_scorecard() {
        let (engine, _) = engine();
        engine.process(&obs(1, 0, ObservationClass::Live)).unwrap();
        assert!(engine.scorecard().is_none());
    }
}
