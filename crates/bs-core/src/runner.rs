//! Stream driver: JSONL in, engine calls out.
//!
//! The reading thread parses each line and hands the observation to one of
//! N workers over a bounded channel. The worker is picked by key hash, so
//! every observation for a key is processed by the same worker in input
//! order while distinct keys proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use bs_common::{Error, Observation, ObservationRecord, Result, SpeciesKey};
use bs_config::ConfigSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{AlertCounts, Engine};
use crate::logging::{event_names, Stage};
use crate::scorecard::DetectionScorecard;

/// Knobs for [`run_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Worker threads. Zero is treated as one.
    pub workers: usize,
    /// Pending observations per worker before the reader blocks.
    pub channel_capacity: usize,
    /// Retire expired windows after this many accepted records. Zero disables.
    pub retire_every: u64,
    /// How far a key may lag the newest timestamp in the stream and still
    /// keep its open window. Retirement never touches a window that ends
    /// within this distance of the newest timestamp.
    pub allowed_lateness: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            channel_capacity: 1024,
            retire_every: 10_000,
            allowed_lateness: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RunOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Totals for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Non-blank input lines.
    pub records_read: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub historical: u64,
    pub live: u64,
    pub not_evaluated: u64,
    pub late: u64,
    pub alerts: AlertCounts,
    pub total_alerts: u64,
    pub baseline_keys: usize,
    pub ready_keys: usize,
    pub open_windows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scorecard: Option<DetectionScorecard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

impl RunSummary {
    /// One-line human summary.
    pub fn render_line(&self) -> String {
        let mut line = format!(
            "{} records ({} rejected), {} alerts [unusual: {} high / {} medium, windowed: {}], {}/{} baselines ready",
            self.records_read,
            self.rejected,
            self.total_alerts,
            self.alerts.unusual_count_high,
            self.alerts.unusual_count_medium,
            self.alerts.windowed,
            self.ready_keys,
            self.baseline_keys,
        );
        if let Some(card) = &self.scorecard {
            line.push_str(&format!(
                ", precision {:.2} recall {:.2} f1 {:.2}",
                card.precision, card.recall, card.f1
            ));
        }
        line
    }
}

#[derive(Debug, Default)]
struct IngestCounts {
    records_read: u64,
    accepted: u64,
    rejected: u64,
}

/// Windows ending at or before the returned instant may be retired.
///
/// Keys progress independently, so the newest timestamp says nothing about
/// a slow key beyond the allowed lateness. Returns `None` when the
/// arithmetic leaves chrono's range.
fn retirement_cutoff(
    newest: DateTime<Utc>,
    window: Duration,
    allowed_lateness: Duration,
) -> Option<DateTime<Utc>> {
    let window = chrono::Duration::from_std(window).ok()?;
    let lateness = chrono::Duration::from_std(allowed_lateness).ok()?;
    newest.checked_sub_signed(window)?.checked_sub_signed(lateness)
}

fn shard_for(key: &SpeciesKey, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Read JSONL observations from `reader` and feed them through `engine`.
///
/// Malformed lines are counted and logged, never fatal. A read error or an
/// alert sink failure stops the run and is returned.
pub fn run_stream<R: BufRead>(reader: R, engine: &Engine, options: &RunOptions) -> Result<RunSummary> {
    let started = Instant::now();
    let started_at = Utc::now();
    let workers = options.workers.max(1);
    let capacity = options.channel_capacity.max(1);
    let log = engine.log_context();

    let aborted = AtomicBool::new(false);
    let failure: Mutex<Option<Error>> = Mutex::new(None);

    let ingest = thread::scope(|s| -> Result<IngestCounts> {
        let mut senders: Vec<SyncSender<Observation>> = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for _ in 0..workers {
            let (tx, rx) = mpsc::sync_channel::<Observation>(capacity);
            senders.push(tx);
            let aborted = &aborted;
            let failure = &failure;
            handles.push(s.spawn(move || {
                for obs in rx {
                    if let Err(e) = engine.process(&obs) {
                        aborted.store(true, Ordering::SeqCst);
                        if let Ok(mut slot) = failure.lock() {
                            slot.get_or_insert(e);
                        }
                        break;
                    }
                }
            }));
        }

        let result = read_lines(reader, engine, options, &senders, &aborted);
        drop(senders);

        for handle in handles {
            if handle.join().is_err() {
                crate::log_event!(
                    log,
                    ERROR,
                    event_names::INTERNAL_ERROR,
                    Stage::Shutdown,
                    "worker thread panicked"
                );
                return Err(Error::Internal("worker thread panicked".to_string()));
            }
        }
        result
    })?;

    let worker_failure = failure
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(e) = worker_failure {
        return Err(e);
    }

    let stats = engine.stats();
    let summary = RunSummary {
        run_id: log.run_id.clone(),
        started_at,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        records_read: ingest.records_read,
        accepted: ingest.accepted,
        rejected: ingest.rejected,
        historical: stats.historical,
        live: stats.live,
        not_evaluated: stats.not_evaluated,
        late: stats.late,
        total_alerts: stats.alerts.total(),
        alerts: stats.alerts,
        baseline_keys: engine.baselines().len(),
        ready_keys: engine.baselines().ready_count(),
        open_windows: engine.windows().len(),
        scorecard: engine.scorecard(),
        config: None,
    };

    crate::log_event!(
        log,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Shutdown,
        summary.render_line(),
        duration_ms = summary.duration_ms
    );
    Ok(summary)
}

fn read_lines<R: BufRead>(
    reader: R,
    engine: &Engine,
    options: &RunOptions,
    senders: &[SyncSender<Observation>],
    aborted: &AtomicBool,
) -> Result<IngestCounts> {
    let log = engine.log_context();
    let window = engine.windows().config().duration();
    let mut counts = IngestCounts::default();
    let mut latest: Option<DateTime<Utc>> = None;

    for (index, line) in reader.lines().enumerate() {
        if aborted.load(Ordering::SeqCst) {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        counts.records_read += 1;

        let obs = match ObservationRecord::parse_line(&line) {
            Ok(obs) => obs,
            Err(e) => {
                counts.rejected += 1;
                crate::log_event!(
                    log,
                    WARN,
                    event_names::RECORD_REJECTED,
                    Stage::Ingest,
                    format!("line {}: {}", index + 1, e),
                    line = (index + 1) as u64
                );
                continue;
            }
        };
        counts.accepted += 1;
        latest = latest.max(Some(obs.timestamp));

        let shard = shard_for(&obs.key, senders.len());
        if senders[shard].send(obs).is_err() {
            // Worker stopped after a sink failure; the error is reported by
            // the caller.
            break;
        }

        if options.retire_every > 0 && counts.accepted % options.retire_every == 0 {
            let cutoff = latest.and_then(|ts| retirement_cutoff(ts, window, options.allowed_lateness));
            if let Some(cutoff) = cutoff {
                engine.retire_expired(cutoff);
            }
        }
    }
    Ok(counts)
}
