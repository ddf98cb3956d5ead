// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// A jittered-interval memoized runner, owned per-probe on a single device.
///
/// Unlike the original's global table keyed by `device name + function
/// name`, each [`Memoized`] instance lives on the `Device` that owns the
/// probe it guards, so two devices polling the same interval never starve
/// or delay each other.
///
/// The initial due time is seeded with `now + U(0, interval)` so that a
/// fleet of devices constructed at the same instant do not all probe in
/// lockstep.
pub struct Memoized {
    interval: Duration,
    next_due: Mutex<Instant>,
    in_flight: AtomicBool,
    last_immediate: AtomicBool,
}

impl Memoized {
    pub fn new(interval: Duration) -> Self {
        let jitter = Duration::from_secs_f64(rand::random::<f64>() * interval.as_secs_f64());
        Self {
            interval,
            next_due: Mutex::new(Instant::now() + jitter),
            in_flight: AtomicBool::new(false),
            last_immediate: AtomicBool::new(false),
        }
    }

    /// Returns `true` when the caller should run its probe now. `immediate`
    /// should reflect a condition that forces the probe regardless of the
    /// interval (e.g. the device has never been initialized); it only fires
    /// on the false-to-true edge, matching the "immediate_signal rose since
    /// last run" rule.
    ///
    /// Callers must invoke [`Memoized::finish`] once their probe completes,
    /// whether it succeeded or failed, to release the in-flight guard.
    pub async fn should_run(&self, immediate: bool) -> bool {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return false;
        }

        let now = Instant::now();
        let mut next_due = self.next_due.lock().await;
        let was_immediate = self.last_immediate.swap(immediate, Ordering::AcqRel);
        let immediate_edge = immediate && !was_immediate;

        if now >= *next_due || immediate_edge {
            *next_due = now + self.interval;
            true
        } else {
            drop(next_due);
            self.in_flight.store(false, Ordering::Release);
            false
        }
    }

    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "memoize_tests.rs"]
mod memoize_tests;
