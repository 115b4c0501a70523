//! File recorder applying the security envelope to every record.

use crate::compression::Compression;
use crate::error::{RecorderError, Result};
use crate::event::Event;
use crate::file_recorder::LogWriter;
use crate::recorder::Recorder;
use crate::security::{SecureEvent, SecurityOptions};
use crate::snapshot;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Options for a [`SecureFileRecorder`].
#[derive(Debug, Clone, Default)]
pub struct SecureFileRecorderOptions {
    pub security: SecurityOptions,
    pub compression: Compression,
    /// Insert a snapshot marker every N events; zero disables.
    pub snapshot_interval: u64,
}

struct SecureInner {
    log: LogWriter,
    event_count: u64,
    closed: bool,
}

/// Recorder persisting envelope-wrapped events to an append-only file.
///
/// Every record passes through redaction, encryption, and integrity tagging
/// as configured, then the same line-per-record pipeline as [`super::FileRecorder`].
pub struct SecureFileRecorder {
    options: SecureFileRecorderOptions,
    inner: Mutex<SecureInner>,
}

impl SecureFileRecorder {
    /// Open `path` with default options: zstd compression, no security
    /// features enabled.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, SecureFileRecorderOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: SecureFileRecorderOptions) -> Result<Self> {
        let log = LogWriter::open(path.as_ref(), options.compression)?;
        Ok(Self {
            options,
            inner: Mutex::new(SecureInner {
                log,
                event_count: 0,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SecureInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_event(&self, inner: &mut SecureInner, event: &Event) -> Result<()> {
        let secure = SecureEvent::wrap(event, &self.options.security)?;
        let record = serde_json::to_vec(&secure)?;
        inner.log.write_line(&record)
    }

    /// Read every stored line, cycling the compression frame first so the
    /// read sees everything written up to this call.
    fn read_stored_lines(&self) -> Vec<String> {
        let mut inner = self.lock();
        if !inner.closed {
            if let Err(err) = inner.log.finish() {
                tracing::warn!(error = %err, "error finishing frame before read");
                return Vec::new();
            }
            if let Err(err) = inner.log.reopen() {
                tracing::warn!(error = %err, "error reopening event log after read");
            }
        }
        let (lines, _truncated) = inner.log.read_lines();
        lines
    }

    /// Scan the stored stream for tampering.
    ///
    /// Returns true on the first envelope whose integrity tag fails, on any
    /// line that does not parse as an envelope, and on an I/O or
    /// decompression error that cuts the stream short. With integrity
    /// disabled there is nothing to verify and the scan reports false.
    pub fn detect_tampering(&self) -> Result<bool> {
        let key = match &self.options.security.integrity_key {
            Some(key) => key.clone(),
            None => return Ok(false),
        };

        let mut inner = self.lock();
        if !inner.closed {
            inner.log.finish()?;
            inner.log.reopen()?;
        }
        let (lines, truncated) = inner.log.read_lines();
        drop(inner);

        for line in &lines {
            if line.is_empty() {
                continue;
            }
            let secure: SecureEvent = match serde_json::from_str(line) {
                Ok(secure) => secure,
                Err(_) => return Ok(true),
            };
            if secure.hmac.is_empty() {
                continue;
            }
            if !secure.verify_integrity(&key)? {
                return Ok(true);
            }
        }

        Ok(truncated)
    }
}

impl Recorder for SecureFileRecorder {
    fn record(&self, event: Event) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(RecorderError::Closed);
        }
        self.write_event(&mut inner, &event)?;
        inner.event_count += 1;

        let interval = self.options.snapshot_interval;
        if interval > 0 && inner.event_count % interval == 0 {
            self.write_event(&mut inner, &snapshot::marker_event())?;
        }
        Ok(())
    }

    fn events(&self) -> Vec<Event> {
        let lines = self.read_stored_lines();

        let mut events = Vec::new();
        for (line_num, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let secure: SecureEvent = match serde_json::from_str(line) {
                Ok(secure) => secure,
                Err(err) => {
                    tracing::warn!(line = line_num + 1, error = %err, "skipping unparseable envelope");
                    continue;
                }
            };
            match secure.unwrap(&self.options.security) {
                Ok(event) => events.push(event),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, error = %err, "skipping unrecoverable envelope");
                }
            }
        }
        events
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.log.truncate();
        inner.event_count = 0;
        inner.closed = false;
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner.log.finish()
    }
}
