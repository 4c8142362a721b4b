//! Cooperative cancellation
//!
//! A script thread never gets killed. Instead every blocking call checks a
//! shared flag when it wakes and returns [`Interrupted`] so the worker can
//! unwind to its top-level frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Raised at the next suspension point after an interrupt was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Interrupted")]
pub struct Interrupted;

/// Below this remaining time the precise sleep spins instead of parking
const SPIN_THRESHOLD: Duration = Duration::from_micros(1500);

#[derive(Default)]
struct Flag {
    raised: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared interrupt flag with interruptible sleeps
#[derive(Clone, Default)]
pub struct InterruptToken {
    inner: Arc<Flag>,
}

impl std::fmt::Debug for InterruptToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptToken")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every sleeper
    pub fn interrupt(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.wake.notify_all();
    }

    /// Clear the flag for a new session
    pub fn reset(&self) {
        self.inner.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` once the flag is raised
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_interrupted() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration` unless interrupted first
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_interrupted() {
                return Err(Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = match self.inner.wake.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        drop(guard);
        self.check()
    }

    pub fn sleep_millis(&self, millis: u64) -> Result<(), Interrupted> {
        self.sleep(Duration::from_millis(millis))
    }

    /// Park for most of the interval, then spin for the tail
    ///
    /// OS timers overshoot by a millisecond or more, which adds up over the
    /// hundreds of steps in a single wind-model move.
    pub fn sleep_precise(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        let deadline = Instant::now() + duration;
        if duration > SPIN_THRESHOLD {
            self.sleep(duration - SPIN_THRESHOLD)?;
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
        self.check()
    }
}
