//! Library side of the `chrono` binary: event-file loading and the REPL.

pub mod load;
pub mod repl;
