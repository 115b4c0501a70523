//! Snapshot markers and checkpoint bookkeeping.
//!
//! A snapshot marker is an in-stream anchor the replayer can restart a
//! backward traversal from. The captured state is a placeholder today;
//! the marker's position in the stream is what matters.

use crate::clock;
use crate::event::{Event, EventKind};
use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque state capture associated with a snapshot marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: i64,
    pub state: Vec<u8>,
}

impl Snapshot {
    /// Capture a snapshot anchored at the event with `trigger_id`.
    pub fn capture(trigger_id: i64) -> Self {
        // TODO: attach a real state dump once the live adapter exposes one.
        Self {
            id: trigger_id,
            state: b"mock state".to_vec(),
        }
    }
}

/// A restorable point in the recorded stream.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: i64,
    pub snapshot: Snapshot,
    pub event_index: usize,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(snapshot: Snapshot, event_index: usize) -> Self {
        Self {
            id: clock::next_event_id(),
            snapshot,
            event_index,
            timestamp: clock::now(),
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checkpoint{{id: {}, event_index: {}, time: {}}}",
            self.id,
            self.event_index,
            self.timestamp.to_rfc3339()
        )
    }
}

/// Build the marker event a recorder writes into the stream.
pub fn marker_event() -> Event {
    Event::new(EventKind::SnapshotMarker, "Snapshot created")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_event_kind() {
        let event = marker_event();
        assert_eq!(event.kind, EventKind::SnapshotMarker);
        assert!(event.is_snapshot_marker());
        assert_eq!(event.details, "Snapshot created");
    }

    #[test]
    fn test_checkpoint_records_index() {
        let checkpoint = Checkpoint::new(Snapshot::capture(99), 42);
        assert_eq!(checkpoint.event_index, 42);
        assert_eq!(checkpoint.snapshot.id, 99);
    }
}
