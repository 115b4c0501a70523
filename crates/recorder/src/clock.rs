//! Wall-clock access with a test override.
//!
//! Production code calls [`now`]. Tests that need deterministic timestamps
//! install a frozen instant with [`freeze`] and hold the returned guard for
//! the duration of the test.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

static OVERRIDE: RwLock<Option<DateTime<Utc>>> = RwLock::new(None);

/// Current instant, nanosecond resolution.
pub fn now() -> DateTime<Utc> {
    let guard = OVERRIDE.read().unwrap_or_else(PoisonError::into_inner);
    match *guard {
        Some(frozen) => frozen,
        None => Utc::now(),
    }
}

/// Freeze the clock at `instant` until the returned guard is dropped.
pub fn freeze(instant: DateTime<Utc>) -> FrozenClock {
    *OVERRIDE.write().unwrap_or_else(PoisonError::into_inner) = Some(instant);
    FrozenClock { _private: () }
}

/// Guard returned by [`freeze`]; restores the system clock on drop.
pub struct FrozenClock {
    _private: (),
}

impl Drop for FrozenClock {
    fn drop(&mut self) {
        *OVERRIDE.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Process-wide nondecreasing event identifier.
///
/// Derived from the wall clock in nanoseconds; ties (or a clock stepping
/// backward) are broken by bumping past the previously issued ID, so IDs
/// reflect emission order even under contention.
pub fn next_event_id() -> i64 {
    let now_nanos = now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let next = if now_nanos > prev { now_nanos } else { prev + 1 };
        match LAST_ID.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    // The override is process-wide, so freezing tests must not interleave.
    static CLOCK_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_freeze_overrides_now() {
        let _serial = CLOCK_TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let _guard = freeze(instant);
        assert_eq!(now(), instant);
    }

    #[test]
    fn test_clock_restored_after_guard_drop() {
        let _serial = CLOCK_TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let instant = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        {
            let _guard = freeze(instant);
            assert_eq!(now(), instant);
        }
        assert_ne!(now().timestamp(), instant.timestamp());
    }

    #[test]
    fn test_event_ids_nondecreasing() {
        let mut prev = next_event_id();
        for _ in 0..1000 {
            let id = next_event_id();
            assert!(id > prev, "expected {} > {}", id, prev);
            prev = id;
        }
    }

    #[test]
    fn test_event_ids_advance_under_frozen_clock() {
        let _serial = CLOCK_TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let _guard = freeze(instant);
        let a = next_event_id();
        let b = next_event_id();
        assert!(b > a);
    }
}
