// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Trigger source that presses a fixed number of times.

use std::thread;
use std::time::Duration;

use super::TriggerSource;
use crate::error::TriggerError;

/// Produces `count` triggers, optionally spaced by `interval`, then closes
#[derive(Debug, Clone)]
pub struct ScriptedTrigger {
    remaining: usize,
    interval: Option<Duration>,
}

impl ScriptedTrigger {
    /// `count` immediate triggers
    pub fn new(count: usize) -> Self {
        Self {
            remaining: count,
            interval: None,
        }
    }

    /// Wait `interval` before each trigger
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Triggers left to produce
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl TriggerSource for ScriptedTrigger {
    fn await_trigger(&mut self) -> Result<(), TriggerError> {
        if self.remaining == 0 {
            return Err(TriggerError::Closed);
        }
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        self.remaining -= 1;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("scripted ({} left)", self.remaining)
    }
}
