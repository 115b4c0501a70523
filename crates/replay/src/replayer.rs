//! The replay cursor and its reconstructed concurrency state.

use crate::details::{self, ConcurrencyEvent};
use crate::error::{ReplayError, Result};
use crate::state::{ChannelState, GoroutineState};
use chronogo_recorder::{Event, EventKind};
use std::collections::HashMap;

/// The logical goroutine considered active before any switch is observed.
const MAIN_GOROUTINE: u64 = 1;

/// Observer invoked for every event the cursor passes during forward replay.
pub type EventObserver = Box<dyn FnMut(usize, &Event) + Send>;

/// Cursor over a loaded event stream.
///
/// `current_index` of -1 means "before the first event". Forward motion
/// derives goroutine/channel state from the stream; backward motion is a
/// cursor move, with [`Replayer::resync_state_to`] available when callers
/// need the reconstructed state to match the new position.
pub struct Replayer {
    events: Vec<Event>,
    current_index: isize,
    goroutines: HashMap<u64, GoroutineState>,
    channels: HashMap<u64, ChannelState>,
    active_goroutine: u64,
    observer: Option<EventObserver>,
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replayer {
    pub fn new() -> Self {
        let mut replayer = Self {
            events: Vec::new(),
            current_index: -1,
            goroutines: HashMap::new(),
            channels: HashMap::new(),
            active_goroutine: MAIN_GOROUTINE,
            observer: None,
        };
        replayer.reset_state();
        replayer
    }

    /// Replace the loaded stream and reset the cursor and all state.
    pub fn load(&mut self, events: Vec<Event>) {
        self.events = events;
        self.current_index = -1;
        self.reset_state();
    }

    /// Install an observer that sees each event as the cursor passes it.
    pub fn set_observer(&mut self, observer: impl FnMut(usize, &Event) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Replay all remaining events.
    pub fn replay_forward(&mut self) {
        self.replay_until(|_| false);
    }

    /// Replay from the event after the cursor, stopping at the first event
    /// matching `predicate`. Returns the index of the match, if any.
    ///
    /// The matching event's side-effects are processed, but it is not
    /// handed to the observer; the cursor parks on it.
    pub fn replay_until(&mut self, mut predicate: impl FnMut(&Event) -> bool) -> Option<usize> {
        let start = (self.current_index + 1).max(0) as usize;
        let mut observer = self.observer.take();

        let mut hit = None;
        for i in start..self.events.len() {
            let event = self.events[i].clone();
            self.process_concurrency_event(&event);

            if predicate(&event) {
                self.current_index = i as isize;
                hit = Some(i);
                break;
            }

            if let Some(observe) = observer.as_mut() {
                observe(i, &event);
            }
            self.current_index = i as isize;
        }

        self.observer = observer;
        hit
    }

    /// Move the cursor to `index`, clamped into the loaded stream.
    /// A cursor move only; reconstructed state is left as-is.
    pub fn replay_to_index(&mut self, index: isize) {
        if self.events.is_empty() {
            return;
        }
        let last = self.events.len() as isize - 1;
        self.current_index = index.clamp(0, last);
    }

    /// Step the cursor backward from `from`. Fails at the beginning.
    pub fn step_backward(&mut self, from: isize) -> Result<isize> {
        if from <= 0 {
            return Err(ReplayError::AtBeginning);
        }
        let new_index = from - 1;
        self.current_index = new_index;
        Ok(new_index)
    }

    /// Rebuild goroutine/channel state so it reflects the stream prefix
    /// ending at `target`, restarting from the nearest snapshot marker at
    /// or before it rather than from index 0 when one exists.
    ///
    /// No breakpoints fire and no observer runs during the rebuild.
    pub fn resync_state_to(&mut self, target: usize) -> Result<()> {
        if target >= self.events.len() {
            return Err(ReplayError::OutOfRange {
                index: target,
                len: self.events.len(),
            });
        }

        let restart = self.events[..=target]
            .iter()
            .rposition(|e| e.kind == EventKind::SnapshotMarker)
            .unwrap_or(0);

        self.reset_state();
        for i in restart..=target {
            let event = self.events[i].clone();
            self.process_concurrency_event(&event);
        }
        self.current_index = target as isize;
        Ok(())
    }

    pub fn current_index(&self) -> isize {
        self.current_index
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Event under the cursor, if the cursor is on one.
    pub fn current_event(&self) -> Option<&Event> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.events.get(i))
    }

    pub fn goroutines(&self) -> &HashMap<u64, GoroutineState> {
        &self.goroutines
    }

    pub fn channels(&self) -> &HashMap<u64, ChannelState> {
        &self.channels
    }

    pub fn active_goroutine(&self) -> u64 {
        self.active_goroutine
    }

    fn reset_state(&mut self) {
        self.goroutines = HashMap::from([(MAIN_GOROUTINE, GoroutineState::running(MAIN_GOROUTINE))]);
        self.channels = HashMap::new();
        self.active_goroutine = MAIN_GOROUTINE;
    }

    /// Apply the state updates mandated by the durable grammar.
    fn process_concurrency_event(&mut self, event: &Event) {
        if !matches!(
            event.kind,
            EventKind::GoroutineSwitch | EventKind::ChannelOperation
        ) {
            return;
        }

        let Some(parsed) = details::parse(&event.details) else {
            tracing::warn!(details = %event.details, "could not parse concurrency event details");
            return;
        };

        match parsed {
            ConcurrencyEvent::GoroutineCreated { id } => {
                self.goroutines.insert(id, GoroutineState::running(id));
            }
            ConcurrencyEvent::GoroutineSwitched { from, to } => {
                if let Some(goroutine) = self.goroutines.get_mut(&from) {
                    goroutine.running = false;
                }
                self.goroutines.insert(to, GoroutineState::running(to));
                self.active_goroutine = to;
            }
            ConcurrencyEvent::GoroutineStateChanged { id, state } => {
                let running = state == "running";
                self.goroutines
                    .entry(id)
                    .and_modify(|g| g.running = running)
                    .or_insert(GoroutineState { id, running });
            }
            ConcurrencyEvent::ChannelSend { channel, .. }
            | ConcurrencyEvent::ChannelRecv { channel, .. }
            | ConcurrencyEvent::ChannelCreated { channel } => {
                self.channels
                    .entry(channel)
                    .or_insert_with(|| ChannelState::new(channel));
            }
            ConcurrencyEvent::ChannelClosed { channel, .. } => {
                self.channels
                    .entry(channel)
                    .or_insert_with(|| ChannelState::new(channel))
                    .closed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, details: &str) -> Event {
        Event::new(kind, details)
    }

    fn tiny_program() -> Vec<Event> {
        vec![
            event(EventKind::FuncEntry, "Entering main"),
            event(EventKind::FuncEntry, "Entering f"),
            event(EventKind::VarAssignment, "y = 100"),
            event(EventKind::FuncExit, "Exiting f"),
            event(EventKind::FuncExit, "Exiting main"),
        ]
    }

    #[test]
    fn test_forward_replay_reaches_end() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        replayer.replay_forward();
        assert_eq!(replayer.current_index(), 4);
    }

    #[test]
    fn test_replay_until_stops_at_first_match() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        let hit = replayer.replay_until(|e| e.details.contains("Entering f"));
        assert_eq!(hit, Some(1));
        assert_eq!(replayer.current_index(), 1);

        // Resuming skips the parked event and finds nothing further.
        let hit = replayer.replay_until(|e| e.details.contains("Entering f"));
        assert_eq!(hit, None);
        assert_eq!(replayer.current_index(), 4);
    }

    #[test]
    fn test_replay_until_on_empty_stream_is_noop() {
        let mut replayer = Replayer::new();
        replayer.load(Vec::new());
        let hit = replayer.replay_until(|_| true);
        assert_eq!(hit, None);
        assert_eq!(replayer.current_index(), -1);
    }

    #[test]
    fn test_replay_to_index_clamps() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        for i in 0..5 {
            replayer.replay_to_index(i);
            assert_eq!(replayer.current_index(), i);
        }
        replayer.replay_to_index(99);
        assert_eq!(replayer.current_index(), 4);
        replayer.replay_to_index(-7);
        assert_eq!(replayer.current_index(), 0);
    }

    #[test]
    fn test_step_backward_sequence() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        replayer.replay_forward();

        assert_eq!(replayer.step_backward(4).unwrap(), 3);
        assert_eq!(replayer.step_backward(3).unwrap(), 2);
        assert_eq!(replayer.step_backward(2).unwrap(), 1);
        assert_eq!(replayer.step_backward(1).unwrap(), 0);
        assert_eq!(replayer.step_backward(0), Err(ReplayError::AtBeginning));
    }

    #[test]
    fn test_concurrency_state_reconstruction() {
        let mut replayer = Replayer::new();
        replayer.load(vec![
            event(EventKind::GoroutineSwitch, "Goroutine 2 created"),
            event(EventKind::GoroutineSwitch, "Goroutine switch from 1 to 2"),
            event(EventKind::ChannelOperation, "Channel 1: send by goroutine 2, value: 42"),
            event(EventKind::ChannelOperation, "Channel 1: closed by goroutine 1"),
        ]);
        replayer.replay_forward();

        assert!(replayer.goroutines()[&2].running);
        assert!(!replayer.goroutines()[&1].running);
        assert_eq!(replayer.active_goroutine(), 2);
        assert!(replayer.channels()[&1].closed);
    }

    #[test]
    fn test_switch_creates_unknown_goroutine() {
        let mut replayer = Replayer::new();
        replayer.load(vec![event(
            EventKind::GoroutineSwitch,
            "Goroutine switch from 1 to 7",
        )]);
        replayer.replay_forward();
        assert!(replayer.goroutines()[&7].running);
        assert_eq!(replayer.active_goroutine(), 7);
    }

    #[test]
    fn test_malformed_details_are_nonfatal() {
        let mut replayer = Replayer::new();
        replayer.load(vec![
            event(EventKind::GoroutineSwitch, "Goroutine ??? created"),
            event(EventKind::FuncEntry, "Entering main"),
        ]);
        replayer.replay_forward();
        assert_eq!(replayer.current_index(), 1);
        assert_eq!(replayer.goroutines().len(), 1);
    }

    #[test]
    fn test_load_resets_state() {
        let mut replayer = Replayer::new();
        replayer.load(vec![event(EventKind::GoroutineSwitch, "Goroutine 5 created")]);
        replayer.replay_forward();
        assert!(replayer.goroutines().contains_key(&5));

        replayer.load(tiny_program());
        assert_eq!(replayer.current_index(), -1);
        assert_eq!(replayer.goroutines().len(), 1);
        assert!(replayer.goroutines()[&1].running);
        assert!(replayer.channels().is_empty());
        assert_eq!(replayer.active_goroutine(), 1);
    }

    #[test]
    fn test_observer_sees_passed_events_not_breakpoint_hit() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        replayer.set_observer(move |i, _event| sink.lock().unwrap().push(i));

        replayer.replay_until(|e| e.details == "y = 100");
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_resync_state_from_marker() {
        let mut replayer = Replayer::new();
        let events = vec![
            event(EventKind::GoroutineSwitch, "Goroutine 2 created"),
            event(EventKind::SnapshotMarker, "Snapshot created"),
            event(EventKind::GoroutineSwitch, "Goroutine switch from 1 to 2"),
            event(EventKind::ChannelOperation, "Channel 1: closed by goroutine 2"),
        ];
        replayer.load(events);
        replayer.replay_forward();
        assert!(replayer.channels()[&1].closed);

        // Resync to just after the switch: the close is no longer visible.
        replayer.resync_state_to(2).unwrap();
        assert_eq!(replayer.current_index(), 2);
        assert_eq!(replayer.active_goroutine(), 2);
        assert!(replayer.channels().is_empty());
        // Goroutine 2's creation happened before the marker, so the restart
        // does not see it, but the switch re-creates it.
        assert!(replayer.goroutines()[&2].running);
    }

    #[test]
    fn test_resync_equals_full_forward_processing() {
        let mut replayer = Replayer::new();
        let events = vec![
            event(EventKind::GoroutineSwitch, "Goroutine 2 created"),
            event(EventKind::GoroutineSwitch, "Goroutine switch from 1 to 2"),
            event(EventKind::SnapshotMarker, "Snapshot created"),
            event(EventKind::ChannelOperation, "Channel 3: send by goroutine 2, value: 1"),
            event(EventKind::GoroutineSwitch, "Goroutine switch from 2 to 1"),
        ];

        replayer.load(events.clone());
        replayer.replay_forward();
        let forward_active = replayer.active_goroutine();
        let forward_channels: Vec<u64> = replayer.channels().keys().copied().collect();

        let mut resynced = Replayer::new();
        resynced.load(events);
        resynced.resync_state_to(4).unwrap();

        assert_eq!(resynced.active_goroutine(), forward_active);
        let mut resynced_channels: Vec<u64> = resynced.channels().keys().copied().collect();
        resynced_channels.sort_unstable();
        let mut forward_channels = forward_channels;
        forward_channels.sort_unstable();
        assert_eq!(resynced_channels, forward_channels);
    }

    #[test]
    fn test_resync_out_of_range() {
        let mut replayer = Replayer::new();
        replayer.load(tiny_program());
        assert!(matches!(
            replayer.resync_state_to(99),
            Err(ReplayError::OutOfRange { index: 99, len: 5 })
        ));
    }
}
