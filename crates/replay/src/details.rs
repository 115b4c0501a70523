//! Parser for the durable concurrency grammar carried in event details.
//!
//! The instrumentation surface writes these exact shapes:
//! - `Goroutine N created`
//! - `Goroutine switch from A to B`
//! - `Goroutine N state: S`
//! - `Channel C: send by goroutine G, value: V`
//! - `Channel C: receive by goroutine G, value: V`
//! - `Channel C: closed by goroutine G`
//! - `Channel C created`

/// A recognized concurrency action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcurrencyEvent {
    GoroutineCreated { id: u64 },
    GoroutineSwitched { from: u64, to: u64 },
    GoroutineStateChanged { id: u64, state: String },
    ChannelSend { channel: u64, goroutine: u64 },
    ChannelRecv { channel: u64, goroutine: u64 },
    ChannelClosed { channel: u64, goroutine: u64 },
    ChannelCreated { channel: u64 },
}

/// Parse a details string against the grammar. `None` means the string is
/// not a concurrency action (or is malformed; callers log and continue).
pub fn parse(details: &str) -> Option<ConcurrencyEvent> {
    if let Some(rest) = details.strip_prefix("Goroutine switch from ") {
        let (from, rest) = take_number(rest)?;
        let rest = rest.strip_prefix(" to ")?;
        let (to, rest) = take_number(rest)?;
        if rest.is_empty() {
            return Some(ConcurrencyEvent::GoroutineSwitched { from, to });
        }
        return None;
    }

    if let Some(rest) = details.strip_prefix("Goroutine ") {
        let (id, rest) = take_number(rest)?;
        if rest == " created" {
            return Some(ConcurrencyEvent::GoroutineCreated { id });
        }
        if let Some(state) = rest.strip_prefix(" state: ") {
            return Some(ConcurrencyEvent::GoroutineStateChanged {
                id,
                state: state.to_string(),
            });
        }
        return None;
    }

    if let Some(rest) = details.strip_prefix("Channel ") {
        let (channel, rest) = take_number(rest)?;
        if rest == " created" {
            return Some(ConcurrencyEvent::ChannelCreated { channel });
        }
        let rest = rest.strip_prefix(": ")?;

        if let Some(rest) = rest.strip_prefix("send by goroutine ") {
            let (goroutine, _) = take_number(rest)?;
            return Some(ConcurrencyEvent::ChannelSend { channel, goroutine });
        }
        if let Some(rest) = rest.strip_prefix("receive by goroutine ") {
            let (goroutine, _) = take_number(rest)?;
            return Some(ConcurrencyEvent::ChannelRecv { channel, goroutine });
        }
        if let Some(rest) = rest.strip_prefix("closed by goroutine ") {
            let (goroutine, rest) = take_number(rest)?;
            if rest.is_empty() {
                return Some(ConcurrencyEvent::ChannelClosed { channel, goroutine });
            }
        }
        return None;
    }

    None
}

/// Split a leading decimal number off `input`.
fn take_number(input: &str) -> Option<(u64, &str)> {
    let end = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let value = input[..end].parse().ok()?;
    Some((value, &input[end..]))
}
