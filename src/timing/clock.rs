// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Clock abstraction.
//!
//! Events are timestamped through a [`Clock`] rather than calling
//! `Instant::now()` directly, so a whole performance can be replayed
//! deterministically in tests with a [`ManualClock`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic timestamps
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Move the clock forward by fractional seconds
    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds.max(0.0)));
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// Seconds from `from` to `to`, negative when `to` comes first
pub fn signed_seconds_between(from: Instant, to: Instant) -> f64 {
    if to >= from {
        to.duration_since(from).as_secs_f64()
    } else {
        -from.duration_since(to).as_secs_f64()
    }
}
