//! Process-wide emission functions called by instrumented code.
//!
//! Every function is safe to call before [`init`] (it becomes a no-op) and
//! never panics on recorder failure; errors are logged so the instrumented
//! program keeps running.

use crate::selective;
use chronogo_recorder::{Event, EventKind, Recorder};
use std::cell::RefCell;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

static RECORDER: RwLock<Option<Arc<dyn Recorder>>> = RwLock::new(None);

/// Longest rendered channel value carried into event details.
const MAX_VALUE_LEN: usize = 256;

thread_local! {
    // Innermost instrumented function scopes on this thread, as package
    // paths. Concurrency emissions attribute themselves to the top entry.
    static SCOPE_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Install the process-wide recorder. Replaces any previous one.
pub fn init(recorder: Arc<dyn Recorder>) {
    *RECORDER.write().unwrap_or_else(PoisonError::into_inner) = Some(recorder);
}

/// Remove the process-wide recorder; subsequent emissions are no-ops.
pub fn shutdown() {
    *RECORDER.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Whether a recorder is currently installed.
pub fn is_initialized() -> bool {
    RECORDER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

fn record(event: Event) {
    let guard = RECORDER.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(recorder) = guard.as_ref() {
        if let Err(err) = recorder.record(event) {
            tracing::warn!(error = %err, "error recording instrumentation event");
        }
    }
}

/// Record entry into `func_name` at `file:line`.
pub fn func_entry(func_name: &str, file: &str, line: u32) {
    let package = package_of(func_name);
    SCOPE_STACK.with(|stack| stack.borrow_mut().push(package.clone()));

    if !selective::should_instrument(&package) {
        return;
    }
    record(
        Event::new(
            EventKind::FuncEntry,
            format!("Entering {} at {}:{}", func_name, file, line),
        )
        .with_location(file, line, func_name),
    );
}

/// Record exit from `func_name` at `file:line`.
pub fn func_exit(func_name: &str, file: &str, line: u32) {
    SCOPE_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });

    let package = package_of(func_name);
    if !selective::should_instrument(&package) {
        return;
    }
    record(
        Event::new(
            EventKind::FuncExit,
            format!("Exiting {} at {}:{}", func_name, file, line),
        )
        .with_location(file, line, func_name),
    );
}

/// Record execution of a specific statement.
pub fn record_statement(func_name: &str, file: &str, line: u32, description: &str) {
    let package = package_of(func_name);
    if !selective::should_instrument(&package) {
        return;
    }
    record(
        Event::new(
            EventKind::StatementExecution,
            format!(
                "Executing statement in {} at {}:{}: {}",
                func_name, file, line, description
            ),
        )
        .with_location(file, line, func_name),
    );
}

/// Record creation of logical goroutine `goroutine_id`.
pub fn goroutine_create(goroutine_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::GoroutineSwitch,
        format!("Goroutine {} created", goroutine_id),
    ));
}

/// Record a scheduler switch between logical goroutines.
pub fn goroutine_switch(from_id: u64, to_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::GoroutineSwitch,
        format!("Goroutine switch from {} to {}", from_id, to_id),
    ));
}

/// Record a goroutine state observation from the runtime integrator.
pub fn goroutine_state(goroutine_id: u64, state: &str) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::GoroutineSwitch,
        format!("Goroutine {} state: {}", goroutine_id, state),
    ));
}

/// Record a channel send.
pub fn channel_send(channel_id: u64, sender_id: u64, value: impl Display) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::ChannelOperation,
        format!(
            "Channel {}: send by goroutine {}, value: {}",
            channel_id,
            sender_id,
            render_value(&value)
        ),
    ));
}

/// Record a channel receive.
pub fn channel_recv(channel_id: u64, receiver_id: u64, value: impl Display) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::ChannelOperation,
        format!(
            "Channel {}: receive by goroutine {}, value: {}",
            channel_id,
            receiver_id,
            render_value(&value)
        ),
    ));
}

/// Record a channel close.
pub fn channel_close(channel_id: u64, goroutine_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::ChannelOperation,
        format!("Channel {}: closed by goroutine {}", channel_id, goroutine_id),
    ));
}

/// Record first sight of a channel.
pub fn channel_create(channel_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::ChannelOperation,
        format!("Channel {} created", channel_id),
    ));
}

/// Record a mutex lock acquisition.
pub fn mutex_lock(mutex_id: u64, goroutine_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::SyncOperation,
        format!("Mutex {}: locked by goroutine {}", mutex_id, goroutine_id),
    ));
}

/// Record a mutex unlock.
pub fn mutex_unlock(mutex_id: u64, goroutine_id: u64) {
    if !caller_instrumented() {
        return;
    }
    record(Event::new(
        EventKind::SyncOperation,
        format!("Mutex {}: unlocked by goroutine {}", mutex_id, goroutine_id),
    ));
}

/// Filter decision for emissions that carry no function name: use the
/// innermost instrumented scope on this thread. With no scope recorded the
/// package is unknown and only the master switch applies.
fn caller_instrumented() -> bool {
    let package = SCOPE_STACK.with(|stack| stack.borrow().last().cloned());
    match package {
        Some(package) => selective::should_instrument(&package),
        None => selective::options().enabled,
    }
}

/// Package path of a qualified function name.
///
/// `github.com/user/app/pkg.Func` yields `github.com/user/app/pkg`;
/// method names with extra dots only split at the first dot after the
/// last slash.
fn package_of(func_name: &str) -> String {
    let after_slash = match func_name.rfind('/') {
        Some(slash) => slash + 1,
        None => 0,
    };
    match func_name[after_slash..].find('.') {
        Some(dot) => func_name[..after_slash + dot].to_string(),
        None => func_name.to_string(),
    }
}

fn render_value(value: &dyn Display) -> String {
    let mut rendered = value.to_string();
    if rendered.len() > MAX_VALUE_LEN {
        let mut cut = MAX_VALUE_LEN;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selective::{set_options, InstrumentOptions};
    use crate::test_support::GLOBAL_STATE;
    use chronogo_recorder::InMemoryRecorder;

    fn wide_open_options() -> InstrumentOptions {
        InstrumentOptions {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
            instrument_stdlib: false,
        }
    }

    fn with_recorder(test: impl FnOnce(&Arc<InMemoryRecorder>)) {
        let _serial = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        let recorder = Arc::new(InMemoryRecorder::new());
        set_options(wide_open_options());
        init(Arc::clone(&recorder) as Arc<dyn Recorder>);
        test(&recorder);
        shutdown();
        set_options(InstrumentOptions::default());
    }

    #[test]
    fn test_emission_before_init_is_noop() {
        let _serial = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        shutdown();
        func_entry("github.com/user/app.main", "main.go", 1);
        goroutine_create(2);
        assert!(!is_initialized());
    }

    #[test]
    fn test_func_entry_exit_grammar() {
        with_recorder(|recorder| {
            func_entry("github.com/user/app.main", "main.go", 10);
            func_exit("github.com/user/app.main", "main.go", 20);

            let events = recorder.events();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].kind, EventKind::FuncEntry);
            assert_eq!(
                events[0].details,
                "Entering github.com/user/app.main at main.go:10"
            );
            assert_eq!(events[0].file, "main.go");
            assert_eq!(events[0].line, 10);
            assert_eq!(events[1].details, "Exiting github.com/user/app.main at main.go:20");
        });
    }

    #[test]
    fn test_statement_grammar() {
        with_recorder(|recorder| {
            record_statement("github.com/user/app.f", "f.go", 7, "x = 42");
            let events = recorder.events();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, EventKind::StatementExecution);
            assert_eq!(
                events[0].details,
                "Executing statement in github.com/user/app.f at f.go:7: x = 42"
            );
        });
    }

    #[test]
    fn test_concurrency_grammar_exact() {
        with_recorder(|recorder| {
            goroutine_create(2);
            goroutine_switch(1, 2);
            channel_send(1, 2, 42);
            channel_recv(1, 3, "hello");
            channel_close(1, 1);
            mutex_lock(5, 2);
            mutex_unlock(5, 2);

            let details: Vec<String> =
                recorder.events().into_iter().map(|e| e.details).collect();
            assert_eq!(
                details,
                vec![
                    "Goroutine 2 created",
                    "Goroutine switch from 1 to 2",
                    "Channel 1: send by goroutine 2, value: 42",
                    "Channel 1: receive by goroutine 3, value: hello",
                    "Channel 1: closed by goroutine 1",
                    "Mutex 5: locked by goroutine 2",
                    "Mutex 5: unlocked by goroutine 2",
                ]
            );
        });
    }

    #[test]
    fn test_filter_blocks_excluded_package() {
        let _serial = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        let recorder = Arc::new(InMemoryRecorder::new());
        set_options(InstrumentOptions {
            enabled: true,
            include: Vec::new(),
            exclude: vec!["github.com/noisy/...".to_string()],
            instrument_stdlib: false,
        });
        init(Arc::clone(&recorder) as Arc<dyn Recorder>);

        func_entry("github.com/noisy/lib.helper", "lib.go", 1);
        func_entry("github.com/user/app.main", "main.go", 1);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].details.contains("github.com/user/app.main"));

        // Unwind the scopes pushed above.
        func_exit("github.com/user/app.main", "main.go", 2);
        func_exit("github.com/noisy/lib.helper", "lib.go", 2);
        shutdown();
        set_options(InstrumentOptions::default());
    }

    #[test]
    fn test_concurrency_uses_enclosing_scope() {
        let _serial = GLOBAL_STATE.lock().unwrap_or_else(PoisonError::into_inner);
        let recorder = Arc::new(InMemoryRecorder::new());
        set_options(InstrumentOptions {
            enabled: true,
            include: Vec::new(),
            exclude: vec!["github.com/noisy/...".to_string()],
            instrument_stdlib: false,
        });
        init(Arc::clone(&recorder) as Arc<dyn Recorder>);

        func_entry("github.com/noisy/lib.worker", "lib.go", 1);
        goroutine_create(9);
        func_exit("github.com/noisy/lib.worker", "lib.go", 2);

        // Inside the excluded scope nothing was emitted.
        assert!(recorder.events().is_empty());

        goroutine_create(9);
        assert_eq!(recorder.events().len(), 1);

        shutdown();
        set_options(InstrumentOptions::default());
    }

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("github.com/user/app/pkg.Func"), "github.com/user/app/pkg");
        assert_eq!(
            package_of("github.com/user/app/pkg.Type.method"),
            "github.com/user/app/pkg"
        );
        assert_eq!(package_of("main.main"), "main");
        assert_eq!(package_of("noloc"), "noloc");
    }

    #[test]
    fn test_render_value_bounded() {
        let long = "x".repeat(1000);
        let rendered = render_value(&long);
        assert!(rendered.len() <= MAX_VALUE_LEN + 3);
        assert!(rendered.ends_with("..."));
        assert_eq!(render_value(&"short"), "short");
    }
}
