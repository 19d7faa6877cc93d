// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Looper - a trigger-driven live looping engine.
//!
//! A performance is a graph of timed snippets. Each snippet records from a
//! live input or replays another snippet's take, and starts and ends on
//! events: program boot, footswitch presses, or other events plus a delay
//! that may only be known once an earlier snippet has been recorded.
//!
//! ```no_run
//! use std::sync::Arc;
//! use looper::audio::{InputRef, SimulatedBackend};
//! use looper::control::ConsoleTrigger;
//! use looper::program::Program;
//! use looper::snippet::SnippetSpec;
//!
//! # fn main() -> looper::Result<()> {
//! let mut program = Program::new(Arc::new(SimulatedBackend::new()));
//! let events = program.events();
//! let track = program.add_track("guitar");
//!
//! let riff = track.add_snippet(
//!     SnippetSpec::live(InputRef::default(), events.boot()).ending_at(events.button_press()),
//! )?;
//! track.add_snippet(SnippetSpec::clone_of(&riff, riff.end().clone()).repeat(-1))?;
//!
//! program.run(ConsoleTrigger::stdin())?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod control;
pub mod demos;
pub mod error;
pub mod events;
pub mod program;
pub mod snippet;
pub mod timing;

pub use error::{EngineError, Result};
pub use events::{Event, EventId, EventKind};
pub use program::{Program, SessionState, Track};
pub use snippet::{DeferredDuration, Length, Repeat, SnippetRef, SnippetSpec};
