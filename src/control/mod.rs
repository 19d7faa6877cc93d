// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performer controls: where triggers come from and where status goes.
//!
//! This module provides:
//! - the [`TriggerSource`] capability and its keyboard, console, scripted
//!   and MIDI footswitch implementations
//! - the [`Indicator`] capability with log, null and in-memory renderings

pub mod console;
pub mod indicator;
pub mod keyboard;
pub mod midi;
pub mod scripted;

pub use console::ConsoleTrigger;
pub use indicator::{Indicator, IndicatorSignal, LogIndicator, MemoryIndicator, NullIndicator};
pub use keyboard::{KeyAction, KeyboardTrigger, Shortcut};
pub use midi::{Footswitch, MidiMessage};
pub use scripted::ScriptedTrigger;

#[cfg(feature = "hardware")]
pub use midi::MidiTrigger;

use std::time::Duration;

use crate::error::TriggerError;

/// Source of external triggers (button, footswitch, key).
///
/// `await_trigger` blocks until the next trigger. It runs on a listener
/// thread, never on the dispatch thread. `TriggerError::Closed` means no
/// further triggers will arrive.
pub trait TriggerSource: Send {
    /// Block until the next trigger
    fn await_trigger(&mut self) -> Result<(), TriggerError>;

    /// Wait at most `timeout` for a trigger; `Ok(false)` when none came.
    ///
    /// The listener uses this so it can notice the session ending. Sources
    /// that cannot wait with a timeout keep the default, which blocks.
    fn poll_trigger(&mut self, timeout: Duration) -> Result<bool, TriggerError> {
        let _ = timeout;
        self.await_trigger().map(|()| true)
    }

    /// Short description for logs
    fn describe(&self) -> String {
        "trigger".to_string()
    }
}

impl<T: TriggerSource + ?Sized> TriggerSource for Box<T> {
    fn await_trigger(&mut self) -> Result<(), TriggerError> {
        (**self).await_trigger()
    }

    fn poll_trigger(&mut self, timeout: Duration) -> Result<bool, TriggerError> {
        (**self).poll_trigger(timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn TriggerSource> = Box::new(ScriptedTrigger::new(1));
        assert_eq!(source.describe(), "scripted (1 left)");
        assert!(source.await_trigger().is_ok());
        assert_eq!(source.await_trigger(), Err(TriggerError::Closed));
    }
}
