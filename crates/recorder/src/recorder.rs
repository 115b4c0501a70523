//! The recorder trait and the in-memory sink.

use crate::error::Result;
use crate::event::Event;
use std::sync::{Mutex, PoisonError};

/// Sink accepting events from many producer threads.
///
/// Implementations serialize `record` calls internally; the trait takes
/// `&self` so a single recorder can be shared behind an `Arc` by the
/// instrumentation surface.
pub trait Recorder: Send + Sync {
    /// Append one event.
    fn record(&self, event: Event) -> Result<()>;

    /// Read-consistent snapshot of everything recorded so far.
    ///
    /// File-backed implementations log and swallow read errors, returning
    /// whatever parsed; `detect_tampering` is the escalation path.
    fn events(&self) -> Vec<Event>;

    /// Drop all recorded events. Best-effort.
    fn clear(&self);

    /// Flush pending data and release resources. `record` fails afterwards.
    fn close(&self) -> Result<()>;
}

/// Recorder keeping events in an owned, ordered in-memory sequence.
#[derive(Default)]
pub struct InMemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Recorder for InMemoryRecorder {
    fn record(&self, event: Event) -> Result<()> {
        self.lock().push(event);
        Ok(())
    }

    fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
