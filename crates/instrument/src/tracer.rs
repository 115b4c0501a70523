//! Runtime tracing integrator.
//!
//! Bridges host-runtime identities to the stable logical IDs the event log
//! speaks: pointer addresses of channels and mutexes, and OS threads as
//! logical goroutines. New identities get sequential IDs on first sight and
//! emit the corresponding creation event. A sampler thread periodically
//! synthesizes `Goroutine N state: S` observations.
//!
//! Host-side trace regions are marked with `tracing` spans alongside each
//! recorded operation.

use crate::registry::IdRegistry;
use crate::surface;
use chronogo_recorder::Recorder;
use std::cell::Cell;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Logical ID reserved for the first (main) worker thread.
const MAIN_WORKER: u64 = 1;

fn worker_registry() -> &'static IdRegistry<ThreadId> {
    static REGISTRY: OnceLock<IdRegistry<ThreadId>> = OnceLock::new();
    REGISTRY.get_or_init(|| IdRegistry::new(MAIN_WORKER))
}

thread_local! {
    static WORKER_ID: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Stable logical goroutine ID of the calling thread.
///
/// Assigned on first call per thread; the first sight of a non-main thread
/// emits the corresponding creation event.
pub fn current_logical_worker_id() -> u64 {
    WORKER_ID.with(|cell| {
        if let Some(id) = cell.get() {
            return id;
        }
        let (id, fresh) = worker_registry().assign(thread::current().id());
        cell.set(Some(id));
        if fresh && id != MAIN_WORKER {
            surface::goroutine_create(id);
        }
        id
    })
}

/// Channel operation kinds accepted by [`RuntimeTracer::trace_channel_op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOp {
    Send,
    Recv,
    Close,
}

/// Mutex operation kinds accepted by [`RuntimeTracer::trace_mutex_op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexOp {
    Lock,
    Unlock,
}

/// Integration state: host-identity maps plus the sampler thread.
pub struct RuntimeTracer {
    channels: IdRegistry<usize>,
    mutexes: IdRegistry<usize>,
    stop: Arc<AtomicBool>,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl Default for RuntimeTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeTracer {
    pub fn new() -> Self {
        Self {
            channels: IdRegistry::new(1),
            mutexes: IdRegistry::new(1),
            stop: Arc::new(AtomicBool::new(false)),
            sampler: Mutex::new(None),
        }
    }

    /// Record a channel operation observed on the host object `host_id`
    /// (typically a pointer address). First sight of a channel emits its
    /// creation event.
    pub fn trace_channel_op(&self, host_id: usize, op: ChannelOp, value: impl Display) {
        let (channel_id, fresh) = self.channels.assign(host_id);
        if fresh {
            surface::channel_create(channel_id);
        }
        let goroutine_id = current_logical_worker_id();

        match op {
            ChannelOp::Send => {
                let span = tracing::trace_span!("channel_send", channel = channel_id, goroutine = goroutine_id);
                let _enter = span.enter();
                surface::channel_send(channel_id, goroutine_id, value);
            }
            ChannelOp::Recv => {
                let span = tracing::trace_span!("channel_recv", channel = channel_id, goroutine = goroutine_id);
                let _enter = span.enter();
                surface::channel_recv(channel_id, goroutine_id, value);
            }
            ChannelOp::Close => {
                let span = tracing::trace_span!("channel_close", channel = channel_id, goroutine = goroutine_id);
                let _enter = span.enter();
                surface::channel_close(channel_id, goroutine_id);
            }
        }
    }

    /// Record a mutex operation observed on the host object `host_id`.
    pub fn trace_mutex_op(&self, host_id: usize, op: MutexOp) {
        let (mutex_id, _) = self.mutexes.assign(host_id);
        let goroutine_id = current_logical_worker_id();

        match op {
            MutexOp::Lock => {
                let span = tracing::trace_span!("mutex_lock", mutex = mutex_id, goroutine = goroutine_id);
                let _enter = span.enter();
                surface::mutex_lock(mutex_id, goroutine_id);
            }
            MutexOp::Unlock => {
                let span = tracing::trace_span!("mutex_unlock", mutex = mutex_id, goroutine = goroutine_id);
                let _enter = span.enter();
                surface::mutex_unlock(mutex_id, goroutine_id);
            }
        }
    }

    /// Start the periodic sampler emitting goroutine state observations.
    pub fn start_sampler(&self, interval: Duration) {
        let mut sampler = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if sampler.is_some() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&self.stop);
        let handle = thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                for worker_id in worker_registry().ids() {
                    // Without host-runtime introspection the portable
                    // sampler can only attest liveness.
                    surface::goroutine_state(worker_id, "running");
                }
                thread::sleep(interval);
            }
        });
        *sampler = Some(handle);
    }

    /// Stop the sampler and wait for it to exit.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("sampler thread panicked");
            }
        }
    }
}

static TRACER: RwLock<Option<Arc<RuntimeTracer>>> = RwLock::new(None);

/// Install the recorder, start a tracer with its sampler, and make it the
/// process-wide tracer instance.
pub fn init_runtime_tracing(
    recorder: Arc<dyn Recorder>,
    sample_interval: Duration,
) -> Arc<RuntimeTracer> {
    surface::init(recorder);
    // The installing thread is the main worker.
    let _ = current_logical_worker_id();

    let tracer = Arc::new(RuntimeTracer::new());
    tracer.start_sampler(sample_interval);
    *TRACER.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&tracer));
    tracer
}

/// Stop and discard the process-wide tracer, if any.
pub fn stop_runtime_tracing() {
    let tracer = TRACER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(tracer) = tracer {
        tracer.stop();
    }
}

/// The process-wide tracer installed by [`init_runtime_tracing`].
pub fn global_tracer() -> Option<Arc<RuntimeTracer>> {
    TRACER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selective::{set_options, InstrumentOptions};
    use crate::test_support::GLOBAL_STATE;
    use chronogo_recorder::{EventKind, InMemoryRecorder};

    fn with_surface(test: impl FnOnce(&Arc<InMemoryRecorder>)) {
        let _serial = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        let recorder = Arc::new(InMemoryRecorder::new());
        set_options(InstrumentOptions::default());
        surface::init(Arc::clone(&recorder) as Arc<dyn Recorder>);
        test(&recorder);
        surface::shutdown();
    }

    #[test]
    fn test_worker_id_stable_within_thread() {
        let a = current_logical_worker_id();
        let b = current_logical_worker_id();
        assert_eq!(a, b);
    }

    #[test]
    fn test_worker_ids_distinct_across_threads() {
        let main_id = current_logical_worker_id();
        let other_id = thread::spawn(current_logical_worker_id).join().unwrap();
        assert_ne!(main_id, other_id);
    }

    #[test]
    fn test_channel_first_sight_emits_creation() {
        with_surface(|recorder| {
            let tracer = RuntimeTracer::new();
            tracer.trace_channel_op(0xdead, ChannelOp::Send, 42);
            tracer.trace_channel_op(0xdead, ChannelOp::Recv, 42);

            let events = recorder.events();
            assert!(events.len() >= 3);
            assert_eq!(events[0].details, "Channel 1 created");
            assert!(events[1].details.starts_with("Channel 1: send by goroutine"));
            assert!(events[2].details.starts_with("Channel 1: receive by goroutine"));
        });
    }

    #[test]
    fn test_distinct_hosts_get_distinct_channel_ids() {
        with_surface(|recorder| {
            let tracer = RuntimeTracer::new();
            tracer.trace_channel_op(0x1000, ChannelOp::Send, "a");
            tracer.trace_channel_op(0x2000, ChannelOp::Send, "b");
            tracer.trace_channel_op(0x1000, ChannelOp::Close, "");

            let details: Vec<String> =
                recorder.events().into_iter().map(|e| e.details).collect();
            assert!(details.iter().any(|d| d == "Channel 1 created"));
            assert!(details.iter().any(|d| d == "Channel 2 created"));
            assert!(details.iter().any(|d| d.starts_with("Channel 1: closed by goroutine")));
        });
    }

    #[test]
    fn test_mutex_ops_recorded() {
        with_surface(|recorder| {
            let tracer = RuntimeTracer::new();
            tracer.trace_mutex_op(0xbeef, MutexOp::Lock);
            tracer.trace_mutex_op(0xbeef, MutexOp::Unlock);

            let events = recorder.events();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].kind, EventKind::SyncOperation);
            assert!(events[0].details.starts_with("Mutex 1: locked by goroutine"));
            assert!(events[1].details.starts_with("Mutex 1: unlocked by goroutine"));
        });
    }

    #[test]
    fn test_sampler_emits_state_events() {
        with_surface(|recorder| {
            let tracer = RuntimeTracer::new();
            tracer.start_sampler(Duration::from_millis(5));
            thread::sleep(Duration::from_millis(60));
            tracer.stop();

            let events = recorder.events();
            assert!(events
                .iter()
                .any(|e| e.kind == EventKind::GoroutineSwitch
                    && e.details.contains("state: running")));
        });
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let tracer = RuntimeTracer::new();
        tracer.stop();
    }
}
