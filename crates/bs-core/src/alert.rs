//! Alert sinks.
//!
//! Both detectors hand finished [`AlertRecord`]s to an [`AlertEmitter`].
//! The engine calls `emit` once per triggering event and never retries.
//!
//! Windowed alerts are re-evaluated on every accumulation, so by default a
//! window that stays over threshold produces one alert per further
//! observation, each carrying the window's running totals. Sinks that need
//! one alert per window should either enable `window.dedupe_per_window` or
//! collapse on `(alertType, species, location, windowStart)`.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bs_common::{AlertRecord, Error, Result};

/// Destination for alerts.
pub trait AlertEmitter: Send + Sync {
    /// Deliver one alert. An error means the sink can no longer accept
    /// alerts; the caller decides whether to stop.
    fn emit(&self, alert: AlertRecord) -> Result<()>;
}

/// Writes each alert as one JSON line.
///
/// A closed pipe on the far side surfaces as [`Error::SinkClosed`].
pub struct JsonlAlertWriter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlAlertWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> AlertEmitter for JsonlAlertWriter<W> {
    fn emit(&self, alert: AlertRecord) -> Result<()> {
        let line = serde_json::to_string(&alert)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::Internal("alert writer lock poisoned".to_string()))?;
        writeln!(writer, "{}", line)
            .and_then(|()| writer.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => Error::SinkClosed,
                _ => Error::Io(e),
            })
    }
}

/// Keeps every alert in memory, in delivery order.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    alerts: Mutex<Vec<AlertRecord>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().map(|alerts| alerts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertEmitter for CollectingEmitter {
    fn emit(&self, alert: AlertRecord) -> Result<()> {
        self.alerts
            .lock()
            .map_err(|_| Error::Internal("alert buffer lock poisoned".to_string()))?
            .push(alert);
        Ok(())
    }
}

/// Discards alerts. Used when only the run summary is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl AlertEmitter for NullEmitter {
    fn emit(&self, _alert: AlertRecord) -> Result<()> {
        Ok(())
    }
}

/// Delivers every alert to each inner emitter, e.g. stdout plus an
/// `--alerts-file`.
///
/// All emitters are attempted; the first error is returned afterwards.
pub struct FanoutEmitter {
    emitters: Vec<Arc<dyn AlertEmitter>>,
}

impl FanoutEmitter {
    pub fn new(emitters: Vec<Arc<dyn AlertEmitter>>) -> Self {
        Self { emitters }
    }
}

impl AlertEmitter for FanoutEmitter {
    fn emit(&self, alert: AlertRecord) -> Result<()> {
        let mut first_error = None;
        for emitter in &self.emitters {
            if let Err(e) = emitter.emit(alert.clone()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<E: AlertEmitter + ?Sized> AlertEmitter for Arc<E> {
    fn emit(&self, alert: AlertRecord) -> Result<()> {
        (**self).emit(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bs_common::{Severity, SpeciesKey};
    use chrono::{DateTime, Utc};

    fn alert() -> AlertRecord {
        AlertRecord::unusual_count(
            SpeciesKey::new("Wren", "Orange"),
            13.0,
            10.0,
            6.0,
            Severity::High,
            DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        )
    }

    #[test]
    fn jsonl_writer_emits_one_line_per_alert() {
        let writer = JsonlAlertWriter::new(Vec::new());
        writer.emit(alert()).unwrap();
        writer.emit(alert()).unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AlertRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, alert());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn jsonl_writer_reports_closed_pipe() {
        let writer = JsonlAlertWriter::new(ClosedPipe);
        assert!(matches!(writer.emit(alert()), Err(Error::SinkClosed)));
    }

    #[test]
    fn fanout_reaches_every_emitter_despite_errors() {
        let collected = Arc::new(CollectingEmitter::new());
        let fanout = FanoutEmitter::new(vec![
            Arc::new(JsonlAlertWriter::new(ClosedPipe)),
            collected.clone(),
        ]);

        assert!(matches!(fanout.emit(alert()), Err(Error::SinkClosed)));
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn null_emitter_accepts_everything() {
        assert!(NullEmitter.emit(alert()).is_ok());
    }
}
