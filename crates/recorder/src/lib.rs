//! Event recording for the ChronoGo time-travel debugger.
//!
//! This crate owns the durable side of the debugger:
//! - The typed [`Event`] record and its newline-delimited JSON wire format
//! - The compression codec wrapping log files in zstd frames
//! - The security envelope (redaction, AES-GCM encryption, HMAC integrity)
//! - The [`Recorder`] sinks: in-memory, file-backed, and secure file-backed
//!
//! # Guarantees
//! - Event IDs are nondecreasing in emission order within one process
//! - Events are never mutated after being recorded
//! - A file recorder serializes concurrent `record` calls behind one lock
//! - Reads are consistent: `events()` finalizes the active compression
//!   frame before reading and starts a fresh frame for later appends

pub mod clock;
pub mod compression;
pub mod error;
pub mod event;
pub mod file_recorder;
pub mod recorder;
pub mod secure_file_recorder;
pub mod security;
pub mod snapshot;

pub use compression::{CompressedReader, CompressedWriter, Compression};
pub use error::{RecorderError, Result};
pub use event::{Event, EventKind};
pub use file_recorder::{FileRecorder, FileRecorderOptions};
pub use recorder::{InMemoryRecorder, Recorder};
pub use secure_file_recorder::{SecureFileRecorder, SecureFileRecorderOptions};
pub use security::{RedactionConfig, SecureEvent, SecurityError, SecurityOptions};
pub use snapshot::{Checkpoint, Snapshot};
