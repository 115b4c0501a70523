//! The typed event record and its wire form.
//!
//! Events serialize as one JSON object per line with Go-style field names
//! (`ID`, `Timestamp`, `Type`, ...) and the kind encoded as a stable small
//! integer. These integers are part of the durable format and must never be
//! renumbered.

use crate::clock;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a recorded event.
///
/// Wire encoding is the stable integer returned by [`EventKind::code`]:
/// `0=FuncEntry 1=FuncExit 2=VarAssignment 3=GoroutineSwitch
/// 4=StatementExecution 5=ChannelOperation 6=SyncOperation 7=SnapshotMarker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FuncEntry,
    FuncExit,
    VarAssignment,
    GoroutineSwitch,
    StatementExecution,
    ChannelOperation,
    SyncOperation,
    SnapshotMarker,
}

impl EventKind {
    /// Stable wire integer for this kind.
    pub const fn code(self) -> i64 {
        match self {
            Self::FuncEntry => 0,
            Self::FuncExit => 1,
            Self::VarAssignment => 2,
            Self::GoroutineSwitch => 3,
            Self::StatementExecution => 4,
            Self::ChannelOperation => 5,
            Self::SyncOperation => 6,
            Self::SnapshotMarker => 7,
        }
    }

    /// Reverse of [`EventKind::code`]. Unknown integers yield `None`; the
    /// log reader treats such lines as unparseable and skips them.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::FuncEntry,
            1 => Self::FuncExit,
            2 => Self::VarAssignment,
            3 => Self::GoroutineSwitch,
            4 => Self::StatementExecution,
            5 => Self::ChannelOperation,
            6 => Self::SyncOperation,
            7 => Self::SnapshotMarker,
            _ => return None,
        })
    }

    /// Human-readable kind name, also used as the event-type breakpoint tag.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FuncEntry => "FunctionEntry",
            Self::FuncExit => "FunctionExit",
            Self::VarAssignment => "VariableAssignment",
            Self::GoroutineSwitch => "GoroutineSwitch",
            Self::StatementExecution => "StatementExecution",
            Self::ChannelOperation => "ChannelOperation",
            Self::SyncOperation => "SyncOperation",
            Self::SnapshotMarker => "SnapshotMarker",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown event type code {}", code)))
    }
}

/// One recorded action of the instrumented program.
///
/// Events are immutable once recorded; readers always receive copies.
/// `line == 0` means the source location is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Type")]
    pub kind: EventKind,
    #[serde(rename = "Details")]
    pub details: String,
    #[serde(rename = "File", default)]
    pub file: String,
    #[serde(rename = "Line", default)]
    pub line: u32,
    #[serde(rename = "FuncName", default)]
    pub func_name: String,
}

impl Event {
    /// New event stamped with a fresh ID and the current clock reading.
    pub fn new(kind: EventKind, details: impl Into<String>) -> Self {
        Self {
            id: clock::next_event_id(),
            timestamp: clock::now(),
            kind,
            details: details.into(),
            file: String::new(),
            line: 0,
            func_name: String::new(),
        }
    }

    /// Attach a source-location triple.
    pub fn with_location(
        mut self,
        file: impl Into<String>,
        line: u32,
        func_name: impl Into<String>,
    ) -> Self {
        self.file = file.into();
        self.line = line;
        self.func_name = func_name.into();
        self
    }

    /// Whether this event is a snapshot marker inserted by a recorder.
    pub fn is_snapshot_marker(&self) -> bool {
        self.kind == EventKind::SnapshotMarker
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Event {}: {} - {}",
            self.timestamp.to_rfc3339(),
            self.id,
            self.kind,
            self.details
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_stable() {
        assert_eq!(EventKind::FuncEntry.code(), 0);
        assert_eq!(EventKind::FuncExit.code(), 1);
        assert_eq!(EventKind::VarAssignment.code(), 2);
        assert_eq!(EventKind::GoroutineSwitch.code(), 3);
        assert_eq!(EventKind::StatementExecution.code(), 4);
        assert_eq!(EventKind::ChannelOperation.code(), 5);
        assert_eq!(EventKind::SyncOperation.code(), 6);
        assert_eq!(EventKind::SnapshotMarker.code(), 7);
    }

    #[test]
    fn test_kind_code_roundtrip() {
        for code in 0..8 {
            let kind = EventKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(EventKind::from_code(8), None);
        assert_eq!(EventKind::from_code(-1), None);
    }

    #[test]
    fn test_event_json_field_names() {
        let event = Event::new(EventKind::FuncEntry, "Entering main")
            .with_location("main.go", 10, "main");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"ID\":"));
        assert!(json.contains("\"Timestamp\":"));
        assert!(json.contains("\"Type\":0"));
        assert!(json.contains("\"Details\":\"Entering main\""));
        assert!(json.contains("\"File\":\"main.go\""));
        assert!(json.contains("\"Line\":10"));
        assert!(json.contains("\"FuncName\":\"main\""));
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = Event::new(EventKind::ChannelOperation, "Channel 1: send by goroutine 2")
            .with_location("worker.go", 42, "worker");
        let json = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_unknown_type_code_rejected() {
        let line = r#"{"ID":1,"Timestamp":"2024-01-02T03:04:05Z","Type":42,"Details":"x","File":"","Line":0,"FuncName":""}"#;
        let result: std::result::Result<Event, _> = serde_json::from_str(line);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_location_fields_default() {
        let line = r#"{"ID":1,"Timestamp":"2024-01-02T03:04:05Z","Type":3,"Details":"Goroutine 2 created"}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert_eq!(event.file, "");
        assert_eq!(event.line, 0);
        assert_eq!(event.func_name, "");
    }
}
