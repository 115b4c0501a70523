//! File-backed recorder: one JSON event per line, optionally zstd-framed.
//!
//! # Write/read cycle
//! Reading a compressed log requires terminating the active frame, so
//! `events()` finishes the frame, starts a fresh one for later appends, and
//! only then reads the file. A log that has been read N times therefore
//! holds N+1 concatenated frames; the codec reader decodes across them.

use crate::compression::{CompressedReader, CompressedWriter, Compression};
use crate::error::{RecorderError, Result};
use crate::event::Event;
use crate::recorder::Recorder;
use crate::snapshot;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-side state shared by the plain and secure file recorders.
pub(crate) struct LogWriter {
    path: PathBuf,
    compression: Compression,
    writer: Option<CompressedWriter<BufWriter<File>>>,
}

impl LogWriter {
    pub(crate) fn open(path: &Path, compression: Compression) -> Result<Self> {
        let mut log = Self {
            path: path.to_path_buf(),
            compression,
            writer: None,
        };
        log.reopen()?;
        Ok(log)
    }

    /// Write one serialized record followed by a newline, then flush the
    /// buffered layer. The compression layer keeps its frame open.
    pub(crate) fn write_line(&mut self, record: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(RecorderError::Closed)?;
        writer.write_all(record)?;
        writer.write_all(b"\n")?;
        writer.flush_sink()?;
        Ok(())
    }

    /// Terminate the current frame and flush everything to disk.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let mut sink = writer.finish()?;
            sink.flush()?;
        }
        Ok(())
    }

    /// Open a fresh append handle and start a new frame.
    pub(crate) fn reopen(&mut self) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = Some(CompressedWriter::new(BufWriter::new(file), self.compression)?);
        Ok(())
    }

    /// Read every line currently on disk. The second element reports
    /// whether an I/O or decompression error cut the read short.
    pub(crate) fn read_lines(&self) -> (Vec<String>, bool) {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot open event log for reading");
                return (Vec::new(), true);
            }
        };
        let reader = match CompressedReader::new(BufReader::new(file), self.compression) {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot open decompressor");
                return (Vec::new(), true);
            }
        };

        let mut lines = Vec::new();
        for line in BufReader::new(reader).lines() {
            match line {
                Ok(line) => lines.push(line),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "event log read stopped early");
                    return (lines, true);
                }
            }
        }
        (lines, false)
    }

    /// Best-effort truncation, leaving the writer ready for new appends.
    pub(crate) fn truncate(&mut self) {
        if let Err(err) = self.finish() {
            tracing::warn!(error = %err, "error finishing frame while clearing");
        }
        if let Err(err) = File::create(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "error truncating event log");
        }
        if let Err(err) = self.reopen() {
            tracing::warn!(error = %err, "error reopening event log after clear");
        }
    }
}

/// Options for a [`FileRecorder`].
#[derive(Debug, Clone, Copy)]
pub struct FileRecorderOptions {
    pub compression: Compression,
    /// Insert a snapshot marker every N events; zero disables.
    pub snapshot_interval: u64,
}

impl Default for FileRecorderOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            snapshot_interval: 0,
        }
    }
}

struct FileInner {
    log: LogWriter,
    event_count: u64,
    closed: bool,
}

/// Recorder persisting events to an append-only file.
pub struct FileRecorder {
    options: FileRecorderOptions,
    inner: Mutex<FileInner>,
}

impl FileRecorder {
    /// Open `path` for appending with default options (zstd, no snapshots).
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, FileRecorderOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: FileRecorderOptions) -> Result<Self> {
        let log = LogWriter::open(path.as_ref(), options.compression)?;
        Ok(Self {
            options,
            inner: Mutex::new(FileInner {
                log,
                event_count: 0,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FileInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_event(inner: &mut FileInner, event: &Event) -> Result<()> {
        let record = serde_json::to_vec(event)?;
        inner.log.write_line(&record)
    }

    fn maybe_write_marker(&self, inner: &mut FileInner) -> Result<()> {
        let interval = self.options.snapshot_interval;
        if interval > 0 && inner.event_count % interval == 0 {
            Self::write_event(inner, &snapshot::marker_event())?;
        }
        Ok(())
    }
}

impl Recorder for FileRecorder {
    fn record(&self, event: Event) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(RecorderError::Closed);
        }
        Self::write_event(&mut inner, &event)?;
        inner.event_count += 1;
        self.maybe_write_marker(&mut inner)
    }

    fn events(&self) -> Vec<Event> {
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
        drop(inner);

        let mut events = Vec::new();
        for (line_num, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, error = %err, "skipping unparseable event line");
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
