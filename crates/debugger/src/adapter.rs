//! Contract for the live native-debugger adapter.
//!
//! The adapter is an external collaborator running the target under a real
//! debugger. It is forward-only: the session compensates for backward steps
//! by relaunching it (see [`crate::session::DebugSession::backstep`]).
//! No implementation ships in the core; tests use the scripted double in
//! [`crate::testing`].

use crate::error::Result;

/// Where the live target is stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// A breakpoint as known to the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterBreakpoint {
    pub id: u32,
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// A variable read from the live target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub value: String,
    pub type_name: String,
}

/// A goroutine observed in the live target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoroutineInfo {
    pub id: u64,
    pub location: AdapterLocation,
}

/// Live-debugger operations the session may issue.
///
/// Attaching is the adapter constructor's job; a [`crate::session::AttachFn`]
/// produces fresh instances when the session needs to relaunch.
pub trait LiveDebugger {
    fn set_breakpoint(&mut self, file: &str, line: u32) -> Result<AdapterBreakpoint>;
    fn set_function_breakpoint(&mut self, name: &str) -> Result<AdapterBreakpoint>;
    fn set_conditional_breakpoint(
        &mut self,
        file: &str,
        line: u32,
        condition: &str,
    ) -> Result<AdapterBreakpoint>;
    fn continue_execution(&mut self) -> Result<AdapterLocation>;
    fn step(&mut self) -> Result<AdapterLocation>;
    fn step_out(&mut self) -> Result<AdapterLocation>;
    fn get_variable(&mut self, name: &str) -> Result<VariableInfo>;
    fn list_goroutines(&mut self) -> Result<Vec<GoroutineInfo>>;
    fn clear_breakpoint(&mut self, id: u32) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
