//! Instrumentation surface for targets recorded by ChronoGo.
//!
//! An instrumented program calls the emission functions in [`surface`] from
//! any number of threads; each call is guarded by the selective filter in
//! [`selective`] and appended to the process-wide recorder installed with
//! [`surface::init`]. Emission before `init` is a no-op, never a crash, and
//! recorder errors are downgraded to logged warnings so user code continues.
//!
//! [`tracer`] adds the runtime integration layer: stable logical IDs for
//! host objects and worker threads, and a periodic sampler that synthesizes
//! goroutine state events.

pub mod registry;
pub mod selective;
pub mod surface;
pub mod tracer;

pub use selective::{events_file_from_env, set_options, should_instrument, InstrumentOptions};
pub use surface::{init, shutdown};
pub use tracer::{
    current_logical_worker_id, init_runtime_tracing, stop_runtime_tracing, ChannelOp, MutexOp,
    RuntimeTracer,
};
