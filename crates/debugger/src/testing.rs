//! Scripted live-debugger double for session tests.

use crate::adapter::{
    AdapterBreakpoint, AdapterLocation, GoroutineInfo, LiveDebugger, VariableInfo,
};
use crate::error::{DebuggerError, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// Call log shared between a [`ScriptedDebugger`] and the test observing it.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Adapter double that records every call and answers from canned data.
pub struct ScriptedDebugger {
    calls: CallLog,
    next_breakpoint_id: u32,
    location: AdapterLocation,
    variables: Vec<VariableInfo>,
    goroutines: Vec<GoroutineInfo>,
    closed: bool,
}

impl ScriptedDebugger {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            next_breakpoint_id: 1,
            location: AdapterLocation::default(),
            variables: Vec::new(),
            goroutines: Vec::new(),
            closed: false,
        }
    }

    pub fn with_variables(mut self, variables: Vec<VariableInfo>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_goroutines(mut self, goroutines: Vec<GoroutineInfo>) -> Self {
        self.goroutines = goroutines;
        self
    }

    fn log(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DebuggerError::Adapter("adapter is closed".to_string()));
        }
        Ok(())
    }
}

impl LiveDebugger for ScriptedDebugger {
    fn set_breakpoint(&mut self, file: &str, line: u32) -> Result<AdapterBreakpoint> {
        self.ensure_open()?;
        self.log(format!("set_breakpoint {}:{}", file, line));
        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        Ok(AdapterBreakpoint {
            id,
            file: file.to_string(),
            line,
            function: String::new(),
        })
    }

    fn set_function_breakpoint(&mut self, name: &str) -> Result<AdapterBreakpoint> {
        self.ensure_open()?;
        self.log(format!("set_function_breakpoint {}", name));
        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        Ok(AdapterBreakpoint {
            id,
            file: String::new(),
            line: 0,
            function: name.to_string(),
        })
    }

    fn set_conditional_breakpoint(
        &mut self,
        file: &str,
        line: u32,
        condition: &str,
    ) -> Result<AdapterBreakpoint> {
        self.ensure_open()?;
        self.log(format!("set_conditional_breakpoint {}:{} if {}", file, line, condition));
        let id = self.next_breakpoint_id;
        self.next_breakpoint_id += 1;
        Ok(AdapterBreakpoint {
            id,
            file: file.to_string(),
            line,
            function: String::new(),
        })
    }

    fn continue_execution(&mut self) -> Result<AdapterLocation> {
        self.ensure_open()?;
        self.log("continue".to_string());
        Ok(self.location.clone())
    }

    fn step(&mut self) -> Result<AdapterLocation> {
        self.ensure_open()?;
        self.log("step".to_string());
        self.location.line += 1;
        Ok(self.location.clone())
    }

    fn step_out(&mut self) -> Result<AdapterLocation> {
        self.ensure_open()?;
        self.log("step_out".to_string());
        Ok(self.location.clone())
    }

    fn get_variable(&mut self, name: &str) -> Result<VariableInfo> {
        self.ensure_open()?;
        self.log(format!("get_variable {}", name));
        self.variables
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| DebuggerError::Adapter(format!("no such variable: {}", name)))
    }

    fn list_goroutines(&mut self) -> Result<Vec<GoroutineInfo>> {
        self.ensure_open()?;
        self.log("list_goroutines".to_string());
        Ok(self.goroutines.clone())
    }

    fn clear_breakpoint(&mut self, id: u32) -> Result<()> {
        self.ensure_open()?;
        self.log(format!("clear_breakpoint {}", id));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log("close".to_string());
        self.closed = true;
        Ok(())
    }
}
