use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("breakpoint {0} not found")]
    BreakpointNotFound(u32),

    #[error("invalid location format: {0}")]
    InvalidLocation(String),

    #[error("invalid line number in {0}")]
    InvalidLine(String),

    #[error("invalid watchpoint type")]
    InvalidWatchpoint,

    #[error("live debugger error: {0}")]
    Adapter(String),

    #[error("no live debugger attached")]
    NoAdapter,

    #[error(transparent)]
    Replay(#[from] chronogo_replay::ReplayError),
}

pub type Result<T> = std::result::Result<T, DebuggerError>;
