//! Run counters
//!
//! Fields are independent atomics, so a snapshot is not consistent across
//! fields while a script is still incrementing them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::Serialize;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Counters for one script run
#[derive(Debug, Default)]
pub struct Statistics {
    start_time: AtomicU64,
    end_time: AtomicU64,
    running: AtomicBool,
    cycles: AtomicU64,
    inputs: AtomicU64,
    objects_detected: AtomicU64,
}

/// Serializable copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub elapsed_ms: u64,
    pub running: bool,
    pub cycles: u64,
    pub inputs: u64,
    pub objects_detected: u64,
}

static GLOBAL: Lazy<Arc<Statistics>> = Lazy::new(|| Arc::new(Statistics::new()));

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide counters
    pub fn global() -> Arc<Statistics> {
        GLOBAL.clone()
    }

    /// Zero every counter and start the clock
    pub fn reset(&self) {
        self.cycles.store(0, Ordering::SeqCst);
        self.inputs.store(0, Ordering::SeqCst);
        self.objects_detected.store(0, Ordering::SeqCst);
        self.start_time.store(now_millis(), Ordering::SeqCst);
        self.end_time.store(0, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    /// Freeze the clock; a second call keeps the first end time
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.end_time.store(now_millis(), Ordering::SeqCst);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn increment_cycles(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_inputs(&self) {
        self.inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_objects_detected(&self, count: u64) {
        self.objects_detected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn inputs(&self) -> u64 {
        self.inputs.load(Ordering::Relaxed)
    }

    pub fn objects_detected(&self) -> u64 {
        self.objects_detected.load(Ordering::Relaxed)
    }

    /// Time since `reset`, frozen once stopped
    pub fn elapsed(&self) -> Duration {
        let start = self.start_time.load(Ordering::SeqCst);
        if start == 0 {
            return Duration::ZERO;
        }
        let end = if self.is_running() {
            now_millis()
        } else {
            self.end_time.load(Ordering::SeqCst)
        };
        Duration::from_millis(end.saturating_sub(start))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elapsed_ms: self.elapsed().as_millis() as u64,
            running: self.is_running(),
            cycles: self.cycles(),
            inputs: self.inputs(),
            objects_detected: self.objects_detected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_elapsed_constant_after_stop() {
        let stats = Statistics::new();
        stats.reset();
        thread::sleep(Duration::from_millis(15));
        stats.stop();

        let first = stats.elapsed();
        thread::sleep(Duration::from_millis(15));
        assert_eq!(stats.elapsed(), first);
        stats.stop();
        assert_eq!(stats.elapsed(), first);
    }

    #[test]
    fn test_reset_clears_counters() {
        let stats = Statistics::new();
        stats.increment_cycles();
        stats.increment_inputs();
        stats.add_objects_detected(3);
        assert_eq!(stats.objects_detected(), 3);

        stats.reset();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cycles, 0);
        assert_eq!(snapshot.inputs, 0);
        assert_eq!(snapshot.objects_detected, 0);
        assert!(snapshot.running);
    }

    #[test]
    fn test_never_started_is_zero() {
        assert_eq!(Statistics::new().elapsed(), Duration::ZERO);
    }
}
