// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Monotonic time (`now`) drives in-process scheduling; wall-clock time
//! (`epoch_ms`) is what gets persisted in samples, outages, and lease
//! records shared across processes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant for interval arithmetic
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch for persisted timestamps
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<(Instant, u64)>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new((Instant::now(), 1_700_000_000_000))),
        }
    }

    /// Advance both the monotonic and wall clocks by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.0 += duration;
        current.1 += duration.as_millis() as u64;
    }

    /// Set the wall clock to a specific epoch-ms value
    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.1 = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn epoch_ms(&self) -> u64 {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}
