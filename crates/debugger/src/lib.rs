//! Breakpoints and debug-session orchestration.
//!
//! The [`BreakpointManager`] owns breakpoint records and evaluates them as
//! a predicate over recorded events. [`DebugSession`] drives a replayer
//! under that predicate and, when a live-debugger adapter is attached,
//! mirrors operations onto it — including the reset dance a forward-only
//! adapter needs when the replayer steps backward.

pub mod adapter;
pub mod breakpoints;
pub mod error;
pub mod session;
pub mod testing;

pub use adapter::{AdapterBreakpoint, AdapterLocation, GoroutineInfo, LiveDebugger, VariableInfo};
pub use breakpoints::{Breakpoint, BreakpointKind, BreakpointManager, WatchMode};
pub use error::{DebuggerError, Result};
pub use session::{AttachFn, DebugSession, SessionInfo, StopReason};
