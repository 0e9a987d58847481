//! Tumbling-window volume detection.
//!
//! Every key has at most one open bucket. Buckets are aligned to the Unix
//! epoch (`start = floor(ts / W) * W`), so all keys share window boundaries.
//! An observation at or past the open bucket's end replaces it with a fresh
//! bucket; nothing carries over.
//!
//! The volume predicate is re-evaluated after every accumulation. By default
//! an open window that stays over threshold alerts on each further
//! observation; with `dedupe_per_window` it alerts at most once.

use bs_common::{AlertRecord, SpeciesKey};
use bs_config::WindowConfig;
use bs_math::checked_ratio;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Contents of one key's open window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBucket {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub total_count: u64,
    pub observation_count: u64,
    /// Whether this window has already raised an alert.
    pub alerted: bool,
}

impl WindowBucket {
    fn open(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        WindowBucket {
            window_start,
            window_end,
            total_count: 0,
            observation_count: 0,
            alerted: false,
        }
    }

    /// Mean count per observation, `None` for an empty bucket.
    pub fn average_count(&self) -> Option<f64> {
        checked_ratio(self.total_count as f64, self.observation_count as f64)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.window_start && ts < self.window_end
    }
}

/// Result of [`WindowAggregator::accumulate`].
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// Counted into the open bucket; `alert` is set when the predicate fired.
    Accumulated {
        bucket: WindowBucket,
        alert: Option<AlertRecord>,
    },
    /// Timestamp precedes the open bucket; not counted.
    Late { open_window_start: DateTime<Utc> },
}

impl WindowOutcome {
    pub fn alert(&self) -> Option<&AlertRecord> {
        match self {
            WindowOutcome::Accumulated { alert, .. } => alert.as_ref(),
            WindowOutcome::Late { .. } => None,
        }
    }

    pub fn into_alert(self) -> Option<AlertRecord> {
        match self {
            WindowOutcome::Accumulated { alert, .. } => alert,
            WindowOutcome::Late { .. } => None,
        }
    }
}

/// Per-key tumbling windows.
#[derive(Debug)]
pub struct WindowAggregator {
    buckets: DashMap<SpeciesKey, WindowBucket>,
    config: WindowConfig,
    duration_ms: i64,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        WindowAggregator::new(WindowConfig::default())
    }
}

impl WindowAggregator {
    pub fn new(config: WindowConfig) -> Self {
        let duration_ms = i64::try_from(config.duration_secs)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .unwrap_or(i64::MAX)
            .max(1);
        WindowAggregator {
            buckets: DashMap::new(),
            config,
            duration_ms,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Epoch-aligned `[start, end)` bounds of the window containing `ts`.
    pub fn window_bounds(&self, ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let ms = ts.timestamp_millis();
        let start_ms = ms.div_euclid(self.duration_ms) * self.duration_ms;
        let end_ms = start_ms.saturating_add(self.duration_ms);
        let start = DateTime::<Utc>::from_timestamp_millis(start_ms).unwrap_or(ts);
        let end = DateTime::<Utc>::from_timestamp_millis(end_ms).unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }

    /// Add one observation to `key`'s open window and evaluate the volume
    /// predicate.
    pub fn accumulate(&self, key: &SpeciesKey, count: u64, timestamp: DateTime<Utc>) -> WindowOutcome {
        let step = match self.buckets.get_mut(key) {
            Some(mut open) => self.advance(&mut open, count, timestamp),
            None => match self.buckets.entry(key.clone()) {
                Entry::Occupied(mut occupied) => self.advance(occupied.get_mut(), count, timestamp),
                Entry::Vacant(vacant) => {
                    let (start, end) = self.window_bounds(timestamp);
                    let mut bucket = WindowBucket::open(start, end);
                    let fire = self.add(&mut bucket, count);
                    vacant.insert(bucket);
                    Ok((bucket, fire))
                }
            },
        };

        let (bucket, fire) = match step {
            Ok(step) => step,
            Err(late) => return late,
        };

        let alert = fire.then(|| {
            AlertRecord::windowed(
                key.clone(),
                bucket.total_count,
                bucket.observation_count,
                bucket.window_start,
                bucket.window_end,
                timestamp,
            )
        });
        WindowOutcome::Accumulated { bucket, alert }
    }

    /// Roll `bucket` forward if needed, then count the observation.
    fn advance(
        &self,
        bucket: &mut WindowBucket,
        count: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<(WindowBucket, bool), WindowOutcome> {
        if timestamp < bucket.window_start {
            return Err(WindowOutcome::Late {
                open_window_start: bucket.window_start,
            });
        }
        if timestamp >= bucket.window_end {
            let (start, end) = self.window_bounds(timestamp);
            *bucket = WindowBucket::open(start, end);
        }
        let fire = self.add(bucket, count);
        Ok((*bucket, fire))
    }

    /// Count one observation; returns whether it should alert.
    fn add(&self, bucket: &mut WindowBucket, count: u64) -> bool {
        bucket.total_count = bucket.total_count.saturating_add(count);
        bucket.observation_count += 1;

        let fire = self.exceeds(bucket) && !(self.config.dedupe_per_window && bucket.alerted);
        if fire {
            bucket.alerted = true;
        }
        fire
    }

    /// Volume predicate on the current bucket contents.
    pub fn exceeds(&self, bucket: &WindowBucket) -> bool {
        bucket.observation_count > self.config.max_observations
            || bucket.total_count > self.config.max_total_count
            || bucket
                .average_count()
                .is_some_and(|avg| avg > self.config.max_average_count)
    }

    /// Copy of `key`'s open bucket.
    pub fn active_bucket(&self, key: &SpeciesKey) -> Option<WindowBucket> {
        self.buckets.get(key).map(|b| *b)
    }

    /// Drop buckets whose window ended at or before `now`. Returns how many
    /// were removed.
    pub fn retire_expired(&self, now: DateTime<Utc>) -> usize {
        let mut retired = 0;
        self.buckets.retain(|_, bucket| {
            let keep = bucket.window_end > now;
            if !keep {
                retired += 1;
            }
            keep
        });
        retired
    }

    /// Number of open buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
