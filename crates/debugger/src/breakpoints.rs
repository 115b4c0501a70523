//! Breakpoint records and the event-matching predicate.

use crate::error::{DebuggerError, Result};
use chronogo_recorder::{Event, EventKind};
use std::fmt;

/// Access mode of a simulated watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// What a breakpoint matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    /// Exact file and line, path-normalized.
    Location { file: String, line: u32 },
    /// Function entry whose name contains the given string.
    Function { name: String },
    /// Events whose kind name equals the tag.
    EventType { tag: String },
    /// Simulated watchpoint on recorded statement executions.
    Watchpoint { expr: String, mode: WatchMode },
}

/// One breakpoint record, owned by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: u32,
    pub kind: BreakpointKind,
    pub enabled: bool,
}

impl Breakpoint {
    pub fn is_watchpoint(&self) -> bool {
        matches!(self.kind, BreakpointKind::Watchpoint { .. })
    }

    /// Whether `event` triggers this breakpoint. Disabled breakpoints
    /// never match.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.kind {
            BreakpointKind::Location { file, line } => {
                if event.file.is_empty() || event.line == 0 {
                    return false;
                }
                normalize_path(&event.file) == normalize_path(file) && event.line == *line
            }
            BreakpointKind::Function { name } => {
                event.kind == EventKind::FuncEntry
                    && (event.func_name.contains(name) || event.details.contains(name))
            }
            BreakpointKind::EventType { tag } => event.kind.name() == tag,
            BreakpointKind::Watchpoint { expr, .. } => {
                // Replay mode cannot distinguish reads from writes; any
                // recorded assignment mentioning the expression matches.
                // A live adapter performs the precise check.
                event.kind == EventKind::StatementExecution
                    && event.details.contains(" = ")
                    && event.details.contains(expr.as_str())
            }
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.enabled { "enabled" } else { "disabled" };
        match &self.kind {
            BreakpointKind::Location { file, line } => {
                write!(f, "{}: {}:{} (location) [{}]", self.id, file, line, status)
            }
            BreakpointKind::Function { name } => {
                write!(f, "{}: {} (function) [{}]", self.id, name, status)
            }
            BreakpointKind::EventType { tag } => {
                write!(f, "{}: {} (event) [{}]", self.id, tag, status)
            }
            BreakpointKind::Watchpoint { expr, mode } => {
                write!(f, "{}: {} (watch, {}) [{}]", self.id, expr, mode, status)
            }
        }
    }
}

/// Case- and separator-insensitive path comparison key.
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// Owns all breakpoint records and evaluates the combined predicate.
#[derive(Default)]
pub struct BreakpointManager {
    breakpoints: Vec<Breakpoint>,
    next_id: u32,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self {
            breakpoints: Vec::new(),
            next_id: 1,
        }
    }

    /// Parse a breakpoint spec and add the breakpoint.
    ///
    /// - `func:NAME` — function breakpoint
    /// - `PATH:LINE` — location breakpoint; the *last* colon separates the
    ///   line so Windows drive letters survive
    /// - anything else — event-type breakpoint with the literal tag
    pub fn add(&mut self, spec: &str) -> Result<Breakpoint> {
        let kind = if let Some(name) = spec.strip_prefix("func:") {
            BreakpointKind::Function {
                name: name.to_string(),
            }
        } else if let Some(last_colon) = spec.rfind(':') {
            let file = &spec[..last_colon];
            let line_str = &spec[last_colon + 1..];
            if file.is_empty() {
                return Err(DebuggerError::InvalidLocation(spec.to_string()));
            }
            let line = line_str
                .parse()
                .map_err(|_| DebuggerError::InvalidLine(spec.to_string()))?;
            BreakpointKind::Location {
                file: file.to_string(),
                line,
            }
        } else {
            BreakpointKind::EventType {
                tag: spec.to_string(),
            }
        };

        Ok(self.push(kind))
    }

    /// Add a simulated watchpoint on `expr`.
    pub fn add_watchpoint(&mut self, expr: &str, mode: WatchMode) -> Breakpoint {
        self.push(BreakpointKind::Watchpoint {
            expr: expr.to_string(),
            mode,
        })
    }

    fn push(&mut self, kind: BreakpointKind) -> Breakpoint {
        let breakpoint = Breakpoint {
            id: self.next_id,
            kind,
            enabled: true,
        };
        self.next_id += 1;
        self.breakpoints.push(breakpoint.clone());
        breakpoint
    }

    pub fn remove(&mut self, id: u32) -> Result<()> {
        let position = self
            .breakpoints
            .iter()
            .position(|bp| bp.id == id)
            .ok_or(DebuggerError::BreakpointNotFound(id))?;
        self.breakpoints.remove(position);
        Ok(())
    }

    pub fn enable(&mut self, id: u32) -> Result<()> {
        self.set_enabled(id, true)
    }

    pub fn disable(&mut self, id: u32) -> Result<()> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&mut self, id: u32, enabled: bool) -> Result<()> {
        let breakpoint = self
            .breakpoints
            .iter_mut()
            .find(|bp| bp.id == id)
            .ok_or(DebuggerError::BreakpointNotFound(id))?;
        breakpoint.enabled = enabled;
        Ok(())
    }

    pub fn list(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn list_watchpoints(&self) -> Vec<&Breakpoint> {
        self.breakpoints.iter().filter(|bp| bp.is_watchpoint()).collect()
    }

    /// The predicate fed to `replay_until`: true when any enabled
    /// breakpoint matches.
    pub fn matches(&self, event: &Event) -> bool {
        self.breakpoints.iter().any(|bp| bp.matches(event))
    }
}
