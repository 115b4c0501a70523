//! Logical goroutine and channel state reconstructed during replay.

/// State of one logical goroutine as derived from the stream prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoroutineState {
    pub id: u64,
    pub running: bool,
}

impl GoroutineState {
    pub fn running(id: u64) -> Self {
        Self { id, running: true }
    }
}

/// State of one channel as derived from the stream prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelState {
    pub id: u64,
    pub pending_messages: Vec<String>,
    pub closed: bool,
}

impl ChannelState {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            pending_messages: Vec::new(),
            closed: false,
        }
    }
}
