//! Loading newline-delimited event files for replay.

use anyhow::Context;
use chronogo_recorder::Event;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read all events from a plain (uncompressed, unwrapped) event file.
///
/// Lines that fail to parse are skipped with a warning; an unreadable file
/// is an error.
pub fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let file = File::open(path)
        .with_context(|| format!("error opening events file {}", path.display()))?;

    let mut events = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("error reading events file {}", path.display()))?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => events.push(event),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "could not parse event line");
            }
        }
    }
    Ok(events)
}
