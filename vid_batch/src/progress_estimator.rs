//! Time-driven per-file progress estimate
//!
//! The encoders expose no cheap progress signal, so the per-file percentage is
//! a heuristic: +2 for every second of wall time since the previous step,
//! capped at 99 until the job succeeds, then forced to 100.
//!
//! `ProgressEstimator` is the pure counter with an injectable [`Clock`];
//! `ProgressTicker` polls it from a background thread while a job runs and
//! stops when its guard is dropped or the batch is cancelled.
//! [`ProgressTicker::finish`] stops the thread and applies the terminal 100.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const STEP: u8 = 2;
pub const CAP: u8 = 99;
pub const STEP_INTERVAL: Duration = Duration::from_secs(1);
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ═══════════════════════════════════════════════════════════════
// Estimator
// ═══════════════════════════════════════════════════════════════

pub struct ProgressEstimator {
    clock: Arc<dyn Clock>,
    value: u8,
    last_step: Instant,
}

impl ProgressEstimator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let last_step = clock.now();
        Self {
            clock,
            value: 0,
            last_step,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advance by one step if at least a second passed since the last one.
    pub fn tick(&mut self) -> u8 {
        if self.value >= CAP {
            return self.value;
        }
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_step) >= STEP_INTERVAL {
            self.value = self.value.saturating_add(STEP).min(CAP);
            self.last_step = now;
        }
        self.value
    }

    /// Terminal success.
    pub fn finish(&mut self) -> u8 {
        self.value = 100;
        self.value
    }
}

// ═══════════════════════════════════════════════════════════════
// Ticker thread (RAII)
// ═══════════════════════════════════════════════════════════════

/// Background poller for one job. Dropping it stops the thread.
pub struct ProgressTicker {
    running: Arc<AtomicBool>,
    estimator: Arc<Mutex<ProgressEstimator>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Poll a fresh estimator every `poll`, calling `on_change` whenever the value moves.
    /// Re-arms only while the guard lives and `cancelled` stays false.
    pub fn start<F>(
        clock: Arc<dyn Clock>,
        poll: Duration,
        cancelled: Arc<AtomicBool>,
        on_change: F,
    ) -> Self
    where
        F: Fn(u8) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let estimator = Arc::new(Mutex::new(ProgressEstimator::new(clock)));
        let estimator_clone = Arc::clone(&estimator);

        let handle = thread::spawn(move || {
            let mut last = 0;
            loop {
                thread::sleep(poll);
                if !running_clone.load(Ordering::Relaxed) || cancelled.load(Ordering::Relaxed) {
                    break;
                }
                let value = estimator_clone
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .tick();
                if value != last {
                    last = value;
                    on_change(value);
                }
            }
        });

        Self {
            running,
            estimator,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Stop polling and force the estimate to 100. No tick is reported after
    /// this returns.
    pub fn finish(mut self) -> u8 {
        self.shutdown();
        self.estimator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .finish()
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Non-decreasing, never above 99 before finish, exactly 100 after.
        #[test]
        fn prop_estimator_monotonic_and_capped(gaps in prop::collection::vec(0u64..3000, 0..120)) {
            let clock = Arc::new(ManualClock::new());
            let mut est = ProgressEstimator::new(clock.clone());
            let mut prev = est.value();
            for ms in gaps {
                clock.advance(Duration::from_millis(ms));
                let v = est.tick();
                prop_assert!(v >= prev);
                prop_assert!(v <= CAP);
                prop_assert!(v - prev <= STEP);
                prev = v;
            }
            prop_assert_eq!(est.finish(), 100);
        }
    }
}
