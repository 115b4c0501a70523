//! The debug session: one replayer, one breakpoint manager, and an
//! optional live adapter, orchestrated under the operator's commands.
//!
//! The session owns both sides and keeps the relationship one-way: the
//! replayer never sees the adapter, the adapter never sees the replayer.

use crate::adapter::{GoroutineInfo, LiveDebugger, VariableInfo};
use crate::breakpoints::{Breakpoint, BreakpointKind, BreakpointManager, WatchMode};
use crate::error::{DebuggerError, Result};
use chronogo_recorder::Event;
use chronogo_replay::{ChannelState, GoroutineState, Replayer};

/// Factory producing a freshly attached adapter; used for the initial
/// attach and for every relaunch after a backward step.
pub type AttachFn = Box<dyn FnMut() -> Result<Box<dyn LiveDebugger>>>;

/// Why `continue_execution` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A breakpoint matched the event at this index.
    Breakpoint(usize),
    /// The cursor reached the end of the stream.
    EndOfStream,
}

/// Snapshot of execution state for the `info` command.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub current_index: isize,
    pub total_events: usize,
    pub current_event: Option<Event>,
    pub active_goroutine: u64,
    pub goroutines: Vec<GoroutineState>,
    pub channels: Vec<ChannelState>,
}

/// Orchestrates replay, breakpoints, and the optional live adapter.
pub struct DebugSession {
    replayer: Replayer,
    breakpoints: BreakpointManager,
    adapter: Option<Box<dyn LiveDebugger>>,
    attach: Option<AttachFn>,
    // session breakpoint id -> adapter breakpoint id
    mirrored: Vec<(u32, u32)>,
}

impl DebugSession {
    /// Replay-only session.
    pub fn new(replayer: Replayer) -> Self {
        Self {
            replayer,
            breakpoints: BreakpointManager::new(),
            adapter: None,
            attach: None,
            mirrored: Vec::new(),
        }
    }

    /// Session with a live adapter. `attach` is called once immediately and
    /// again on every relaunch.
    pub fn with_adapter(replayer: Replayer, mut attach: AttachFn) -> Result<Self> {
        let adapter = attach()?;
        Ok(Self {
            replayer,
            breakpoints: BreakpointManager::new(),
            adapter: Some(adapter),
            attach: Some(attach),
            mirrored: Vec::new(),
        })
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn replayer_mut(&mut self) -> &mut Replayer {
        &mut self.replayer
    }

    /// `continue`: replay until a breakpoint matches, mirroring to the
    /// live adapter when one is attached.
    pub fn continue_execution(&mut self) -> StopReason {
        let breakpoints = &self.breakpoints;
        let hit = self.replayer.replay_until(|event| breakpoints.matches(event));

        if let Some(adapter) = self.adapter.as_mut() {
            if let Err(err) = adapter.continue_execution() {
                tracing::warn!(error = %err, "live debugger error on continue");
            }
        }

        match hit {
            Some(index) => StopReason::Breakpoint(index),
            None => StopReason::EndOfStream,
        }
    }

    /// `step`: advance the cursor one event, stepping the adapter too.
    pub fn step(&mut self) -> Option<Event> {
        if let Some(adapter) = self.adapter.as_mut() {
            if let Err(err) = adapter.step() {
                tracing::warn!(error = %err, "live debugger error on step");
            }
        }

        let next = self.replayer.current_index() + 1;
        self.replayer.replay_to_index(next);
        self.replayer.current_event().cloned()
    }

    /// `backstep`: move the cursor back one event and resynchronize both
    /// the reconstructed state and, when attached, the live adapter.
    ///
    /// The adapter cannot run backward, so it is closed, relaunched, and
    /// fast-forwarded to a location approximating the new cursor via a
    /// transient breakpoint.
    pub fn backstep(&mut self) -> Result<isize> {
        let current = self.replayer.current_index();
        let new_index = self.replayer.step_backward(current)?;

        // Reconstructed goroutine/channel state is prefix-derived; rebuild
        // it from the nearest snapshot marker.
        if new_index >= 0 {
            self.replayer.resync_state_to(new_index as usize)?;
        }

        if self.adapter.is_some() {
            if let Err(err) = self.reset_adapter_to(new_index) {
                tracing::warn!(error = %err, "could not resynchronize live debugger");
            }
        }

        Ok(new_index)
    }

    fn reset_adapter_to(&mut self, index: isize) -> Result<()> {
        let attach = self.attach.as_mut().ok_or(DebuggerError::NoAdapter)?;

        if let Some(mut old) = self.adapter.take() {
            if let Err(err) = old.close() {
                tracing::warn!(error = %err, "error closing live debugger");
            }
        }
        let mut adapter = attach()?;
        self.mirrored.clear();

        // Restore the operator's breakpoints in the fresh instance.
        for breakpoint in self.breakpoints.list() {
            let result = match &breakpoint.kind {
                BreakpointKind::Location { file, line } => adapter.set_breakpoint(file, *line),
                BreakpointKind::Function { name } => adapter.set_function_breakpoint(name),
                _ => continue,
            };
            match result {
                Ok(mirrored) => self.mirrored.push((breakpoint.id, mirrored.id)),
                Err(err) => {
                    tracing::warn!(id = breakpoint.id, error = %err, "could not restore breakpoint")
                }
            }
        }

        // Fast-forward to a location approximating the new cursor.
        if let Some((file, line)) = self.sync_location_near(index) {
            let transient = adapter.set_breakpoint(&file, line)?;
            if let Err(err) = adapter.continue_execution() {
                tracing::warn!(error = %err, "error continuing to sync location");
            }
            adapter.clear_breakpoint(transient.id)?;
        }

        self.adapter = Some(adapter);
        Ok(())
    }

    /// File:line of the event at `index`, or of the nearest neighbor that
    /// has one.
    fn sync_location_near(&self, index: isize) -> Option<(String, u32)> {
        let events = self.replayer.events();
        let index = usize::try_from(index).ok()?;

        let located = |event: &Event| {
            if !event.file.is_empty() && event.line > 0 {
                Some((event.file.clone(), event.line))
            } else {
                None
            }
        };

        if let Some(location) = events.get(index).and_then(|e| located(e)) {
            return Some(location);
        }
        for offset in 1..=5 {
            if let Some(location) = index
                .checked_sub(offset)
                .and_then(|i| events.get(i))
                .and_then(|e| located(e))
            {
                return Some(location);
            }
            if let Some(location) = events.get(index + offset).and_then(|e| located(e)) {
                return Some(location);
            }
        }
        None
    }

    /// Add a breakpoint from a spec string, mirroring it to the adapter.
    pub fn add_breakpoint(&mut self, spec: &str) -> Result<Breakpoint> {
        self.add_breakpoint_with_condition(spec, None)
    }

    /// Add a breakpoint, conditionally on the live side when a condition
    /// is given (replay matching ignores the condition).
    pub fn add_breakpoint_with_condition(
        &mut self,
        spec: &str,
        condition: Option<&str>,
    ) -> Result<Breakpoint> {
        let breakpoint = self.breakpoints.add(spec)?;

        if let Some(adapter) = self.adapter.as_mut() {
            let result = match (&breakpoint.kind, condition) {
                (BreakpointKind::Location { file, line }, Some(cond)) => {
                    adapter.set_conditional_breakpoint(file, *line, cond)
                }
                (BreakpointKind::Location { file, line }, None) => {
                    adapter.set_breakpoint(file, *line)
                }
                (BreakpointKind::Function { name }, _) => adapter.set_function_breakpoint(name),
                _ => return Ok(breakpoint),
            };
            match result {
                Ok(mirrored) => self.mirrored.push((breakpoint.id, mirrored.id)),
                Err(err) => tracing::warn!(error = %err, "could not mirror breakpoint to live debugger"),
            }
        }

        Ok(breakpoint)
    }

    /// Add a simulated watchpoint. Watchpoints are replay-only; the live
    /// adapter contract has no equivalent operation.
    pub fn add_watchpoint(&mut self, expr: &str, mode: WatchMode) -> Breakpoint {
        self.breakpoints.add_watchpoint(expr, mode)
    }

    pub fn remove_breakpoint(&mut self, id: u32) -> Result<()> {
        self.breakpoints.remove(id)?;
        if let Some(position) = self.mirrored.iter().position(|(ours, _)| *ours == id) {
            let (_, adapter_id) = self.mirrored.remove(position);
            if let Some(adapter) = self.adapter.as_mut() {
                if let Err(err) = adapter.clear_breakpoint(adapter_id) {
                    tracing::warn!(error = %err, "could not clear mirrored breakpoint");
                }
            }
        }
        Ok(())
    }

    pub fn enable_breakpoint(&mut self, id: u32) -> Result<()> {
        self.breakpoints.enable(id)
    }

    pub fn disable_breakpoint(&mut self, id: u32) -> Result<()> {
        self.breakpoints.disable(id)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        self.breakpoints.list()
    }

    pub fn list_watchpoints(&self) -> Vec<&Breakpoint> {
        self.breakpoints.list_watchpoints()
    }

    /// `print var` — live adapter passthrough.
    pub fn print_variable(&mut self, name: &str) -> Result<VariableInfo> {
        let adapter = self.adapter.as_mut().ok_or(DebuggerError::NoAdapter)?;
        adapter.get_variable(name)
    }

    /// `goroutines` — live adapter passthrough.
    pub fn list_goroutines(&mut self) -> Result<Vec<GoroutineInfo>> {
        let adapter = self.adapter.as_mut().ok_or(DebuggerError::NoAdapter)?;
        adapter.list_goroutines()
    }

    /// `info` — answered from replayed event state alone.
    pub fn info(&self) -> SessionInfo {
        let mut goroutines: Vec<GoroutineState> =
            self.replayer.goroutines().values().cloned().collect();
        goroutines.sort_by_key(|g| g.id);
        let mut channels: Vec<ChannelState> = self.replayer.channels().values().cloned().collect();
        channels.sort_by_key(|c| c.id);

        SessionInfo {
            current_index: self.replayer.current_index(),
            total_events: self.replayer.events().len(),
            current_event: self.replayer.current_event().cloned(),
            active_goroutine: self.replayer.active_goroutine(),
            goroutines,
            channels,
        }
    }

    /// Close the live adapter, if any.
    pub fn close(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            if let Err(err) = adapter.close() {
                tracing::warn!(error = %err, "error closing live debugger");
            }
        }
    }
}
