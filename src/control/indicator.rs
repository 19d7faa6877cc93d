// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performer-facing status signals (the "recording" light).

use std::sync::{Mutex, MutexGuard};

use tracing::info;

/// Receives status signals from snippet actions.
///
/// Signals are sent from the dispatch thread and must return promptly.
pub trait Indicator: Send + Sync {
    /// A snippet started capturing
    fn recording_started(&self, snippet: &str);

    /// A snippet finished capturing a take of `seconds`
    fn recording_stopped(&self, snippet: &str, seconds: f64);

    /// A snippet's sound is now sent to the output
    fn monitoring_started(&self, _snippet: &str) {}

    /// A snippet's sound is no longer sent to the output
    fn monitoring_stopped(&self, _snippet: &str) {}
}

/// Indicator that ignores every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndicator;

impl Indicator for NullIndicator {
    fn recording_started(&self, _snippet: &str) {}

    fn recording_stopped(&self, _snippet: &str, _seconds: f64) {}
}

/// Indicator rendered as log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn recording_started(&self, snippet: &str) {
        info!(snippet, "now recording");
    }

    fn recording_stopped(&self, snippet: &str, seconds: f64) {
        info!(snippet, "stopped recording, length {:.3}s", seconds);
    }

    fn monitoring_started(&self, snippet: &str) {
        info!(snippet, "monitoring on");
    }

    fn monitoring_stopped(&self, snippet: &str) {
        info!(snippet, "monitoring off");
    }
}

/// A signal captured by [`MemoryIndicator`]
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorSignal {
    RecordingStarted(String),
    RecordingStopped(String, f64),
    MonitoringStarted(String),
    MonitoringStopped(String),
}

/// Indicator that keeps every signal in order
#[derive(Debug, Default)]
pub struct MemoryIndicator {
    signals: Mutex<Vec<IndicatorSignal>>,
}

impl MemoryIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<IndicatorSignal>> {
        self.signals.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Signals received so far
    pub fn signals(&self) -> Vec<IndicatorSignal> {
        self.log().clone()
    }

    /// Whether a recording is currently in progress
    pub fn is_recording(&self) -> bool {
        let mut active = 0i32;
        for signal in self.log().iter() {
            match signal {
                IndicatorSignal::RecordingStarted(_) => active += 1,
                IndicatorSignal::RecordingStopped(..) => active -= 1,
                _ => {}
            }
        }
        active > 0
    }
}

impl Indicator for MemoryIndicator {
    fn recording_started(&self, snippet: &str) {
        self.log()
            .push(IndicatorSignal::RecordingStarted(snippet.to_string()));
    }

    fn recording_stopped(&self, snippet: &str, seconds: f64) {
        self.log()
            .push(IndicatorSignal::RecordingStopped(snippet.to_string(), seconds));
    }

    fn monitoring_started(&self, snippet: &str) {
        self.log()
            .push(IndicatorSignal::MonitoringStarted(snippet.to_string()));
    }

    fn monitoring_stopped(&self, snippet: &str) {
        self.log()
            .push(IndicatorSignal::MonitoringStopped(snippet.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_indicator_tracks_recording() {
        let indicator = MemoryIndicator::new();
        assert!(!indicator.is_recording());

        indicator.recording_started("a");
        indicator.monitoring_started("b");
        assert!(indicator.is_recording());

        indicator.recording_stopped("a", 1.0);
        assert!(!indicator.is_recording());
        assert_eq!(indicator.signals().len(), 3);
    }

    #[test]
    fn test_default_monitoring_signals_are_noops() {
        let indicator = NullIndicator;
        indicator.monitoring_started("x");
        indicator.monitoring_stopped("x");
    }
}
