//! Deterministic replay over a recorded event stream.
//!
//! The replayer is a cursor: `Before` (index -1), `At(i)`, or past the last
//! event. Forward motion processes concurrency side-effects and evaluates a
//! breakpoint predicate; backward motion is a cursor move plus an optional
//! state resynchronization anchored at the nearest snapshot marker, because
//! a recorded history cannot be re-run.

pub mod details;
pub mod error;
pub mod replayer;
pub mod state;

pub use error::{ReplayError, Result};
pub use replayer::Replayer;
pub use state::{ChannelState, GoroutineState};
