// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Snippets: timed record/playback segments.
//!
//! A snippet combines two independent behaviors:
//! - a [`SourceBehavior`]: live input, or a clone of another snippet's take
//! - a [`LengthBehavior`]: bounded by an end event, or derived from a
//!   duration (`end = start + duration`)
//!
//! Each combination wires a different sequence of actions onto the
//! snippet's start and end events. Wiring happens once, for every snippet,
//! before Boot fires.

pub mod cloned;
pub mod duration;
pub mod live;

pub use duration::{DeferredDuration, Length};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{AudioBackend, AudioBuffer, Effect, InputRef};
use crate::control::Indicator;
use crate::error::{ConstructionError, Result};
use crate::events::Event;
use crate::timing::signed_seconds_between;

/// Identifier of a snippet, unique within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippetId(pub(crate) u64);

impl SnippetId {
    /// Raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// How many times a cloned snippet plays its take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    /// Never plays
    Disabled,
    /// Plays once
    #[default]
    Once,
    /// Loops a fixed number of times
    Times(u32),
    /// Loops until the program ends
    Forever,
}

impl Repeat {
    /// Integer form: 1 once, 0 disabled, -1 forever, n > 1 count
    pub fn count(&self) -> i64 {
        match self {
            Repeat::Disabled => 0,
            Repeat::Once => 1,
            Repeat::Times(n) => *n as i64,
            Repeat::Forever => -1,
        }
    }

    /// Whether playback loops
    pub fn loops(&self) -> bool {
        matches!(self, Repeat::Times(_) | Repeat::Forever)
    }
}

impl TryFrom<i64> for Repeat {
    type Error = ConstructionError;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(Repeat::Forever),
            0 => Ok(Repeat::Disabled),
            1 => Ok(Repeat::Once),
            n if n > 1 => u32::try_from(n)
                .map(Repeat::Times)
                .map_err(|_| ConstructionError::InvalidRepeat(n)),
            n => Err(ConstructionError::InvalidRepeat(n)),
        }
    }
}

/// What a snippet records or plays
#[derive(Clone)]
pub enum SourceBehavior {
    /// Captured from a live input
    Live(InputRef),
    /// Replays another snippet's finalized take
    Cloned(SnippetRef),
}

impl fmt::Debug for SourceBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceBehavior::Live(input) => f.debug_tuple("Live").field(input).finish(),
            SourceBehavior::Cloned(source) => f.debug_tuple("Cloned").field(&source.name()).finish(),
        }
    }
}

/// How a snippet's length is determined
#[derive(Debug, Clone)]
pub enum LengthBehavior {
    /// Whatever elapses between start and an explicit end event
    EventBounded { end: Event },
    /// A declared length; the end is derived as `start + declared`
    DurationDerived { declared: Length, end: Event },
}

impl LengthBehavior {
    /// End event, supplied or derived
    pub fn end(&self) -> &Event {
        match self {
            LengthBehavior::EventBounded { end } => end,
            LengthBehavior::DurationDerived { end, .. } => end,
        }
    }
}

pub(crate) struct SnippetCore {
    id: SnippetId,
    name: String,
    start: Event,
    length: LengthBehavior,
    cloned: bool,
    recording: AtomicBool,
    take: Mutex<Option<AudioBuffer>>,
}

/// Cheap shared reference to a snippet's timing and take
#[derive(Clone)]
pub struct SnippetRef {
    core: Arc<SnippetCore>,
}

impl SnippetRef {
    pub(crate) fn new(
        id: SnippetId,
        name: String,
        start: Event,
        length: LengthBehavior,
        cloned: bool,
    ) -> Self {
        Self {
            core: Arc::new(SnippetCore {
                id,
                name,
                start,
                length,
                cloned,
                recording: AtomicBool::new(false),
                take: Mutex::new(None),
            }),
        }
    }

    fn take_slot(&self) -> MutexGuard<'_, Option<AudioBuffer>> {
        self.core.take.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snippet identifier
    pub fn id(&self) -> SnippetId {
        self.core.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Start event
    pub fn start(&self) -> &Event {
        &self.core.start
    }

    /// End event, supplied or derived
    pub fn end(&self) -> &Event {
        self.core.length.end()
    }

    /// Length behavior
    pub fn length(&self) -> &LengthBehavior {
        &self.core.length
    }

    /// Whether this snippet replays another snippet
    pub fn is_clone(&self) -> bool {
        self.core.cloned
    }

    /// Whether another snippet clones this one, so its take must be kept
    pub fn is_recording(&self) -> bool {
        self.core.recording.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_recording(&self) {
        self.core.recording.store(true, Ordering::SeqCst);
    }

    /// Finalized take, once recorded (or aliased, for clones)
    pub fn take(&self) -> Option<AudioBuffer> {
        self.take_slot().clone()
    }

    pub(crate) fn store_take(&self, buffer: AudioBuffer) {
        *self.take_slot() = Some(buffer);
    }

    /// Duration in seconds, if it can be known now.
    ///
    /// Event-bounded: end time minus start time once both have fired, not
    /// clamped. Derived: the declared length once it resolves.
    pub fn resolved_seconds(&self) -> Option<f64> {
        match &self.core.length {
            LengthBehavior::EventBounded { end } => {
                let start = self.core.start.fired_at()?;
                let end = end.fired_at()?;
                Some(signed_seconds_between(start, end))
            }
            LengthBehavior::DurationDerived { declared, .. } => declared.try_seconds(),
        }
    }

    /// Duration: resolved seconds, or a deferred reference to this snippet
    pub fn duration(&self) -> Length {
        match self.resolved_seconds() {
            Some(seconds) => Length::Resolved(seconds),
            None => Length::Deferred(DeferredDuration::new(self.clone())),
        }
    }

    /// Whether two references point at the same snippet
    pub fn same_as(&self, other: &SnippetRef) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for SnippetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnippetRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("start", &self.start().id())
            .field("end", &self.end().id())
            .field("recording", &self.is_recording())
            .finish()
    }
}

/// Declarative parameters for a new snippet, validated by `Track::add_snippet`
#[derive(Clone)]
pub struct SnippetSpec {
    pub(crate) source: SourceBehavior,
    pub(crate) start: Event,
    pub(crate) end: Option<Event>,
    pub(crate) duration: Option<Length>,
    pub(crate) repeat: Option<i64>,
    pub(crate) effects: Vec<Arc<dyn Effect>>,
    pub(crate) monitoring: bool,
    pub(crate) name: Option<String>,
}

impl SnippetSpec {
    fn new(source: SourceBehavior, start: Event) -> Self {
        Self {
            source,
            start,
            end: None,
            duration: None,
            repeat: None,
            effects: Vec::new(),
            monitoring: true,
            name: None,
        }
    }

    /// Snippet recording from a live input, starting at `start`
    pub fn live(input: InputRef, start: Event) -> Self {
        Self::new(SourceBehavior::Live(input), start)
    }

    /// Snippet replaying `source`'s take, starting at `start`
    pub fn clone_of(source: &SnippetRef, start: Event) -> Self {
        Self::new(SourceBehavior::Cloned(source.clone()), start)
    }

    /// End at an explicit event
    pub fn ending_at(mut self, end: Event) -> Self {
        self.end = Some(end);
        self
    }

    /// Last for a number of seconds or a deferred duration
    pub fn lasting(mut self, duration: impl Into<Length>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Repeat count: 1 once, 0 disabled, -1 forever, n > 1 loops.
    ///
    /// Live snippets accept only an explicit 1, the same as leaving it
    /// unset; any other count is `ConstructionError::RepeatOnLiveInput`.
    pub fn repeat(mut self, count: i64) -> Self {
        self.repeat = Some(count);
        self
    }

    /// Append an effect
    pub fn effect(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }

    /// Send the snippet's sound to the output (default on)
    pub fn monitoring(mut self, monitoring: bool) -> Self {
        self.monitoring = monitoring;
        self
    }

    /// Display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Capabilities available while wiring snippets
#[derive(Clone)]
pub struct WiringContext {
    pub backend: Arc<dyn AudioBackend>,
    pub indicator: Arc<dyn Indicator>,
    /// Initial size of growable capture buffers
    pub initial_capture_seconds: f64,
}

/// A snippet owned by a track
pub struct Snippet {
    shared: SnippetRef,
    source: SourceBehavior,
    repeat: Repeat,
    effects: Vec<Arc<dyn Effect>>,
    monitoring: bool,
    explicit_length: bool,
    playback_end: Option<Event>,
    wired: bool,
}

impl Snippet {
    pub(crate) fn new(
        shared: SnippetRef,
        source: SourceBehavior,
        repeat: Repeat,
        effects: Vec<Arc<dyn Effect>>,
        monitoring: bool,
        explicit_length: bool,
        playback_end: Option<Event>,
    ) -> Self {
        Self {
            shared,
            source,
            repeat,
            effects,
            monitoring,
            explicit_length,
            playback_end,
            wired: false,
        }
    }

    /// Shared reference to this snippet
    pub fn handle(&self) -> &SnippetRef {
        &self.shared
    }

    /// Snippet identifier
    pub fn id(&self) -> SnippetId {
        self.shared.id()
    }

    /// Display name
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Source behavior
    pub fn source(&self) -> &SourceBehavior {
        &self.source
    }

    /// Repeat setting
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Effects in application order
    pub fn effects(&self) -> &[Arc<dyn Effect>] {
        &self.effects
    }

    /// Whether the snippet is monitored
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Whether the length was given explicitly rather than inherited
    pub fn has_explicit_length(&self) -> bool {
        self.explicit_length
    }

    /// End of looped playback, for finite repeats
    pub fn playback_end(&self) -> Option<&Event> {
        self.playback_end.as_ref()
    }

    /// Whether the snippet has been wired
    pub fn is_wired(&self) -> bool {
        self.wired
    }

    /// Register this snippet's recording/playback actions on its events.
    ///
    /// Runs once; later calls do nothing.
    pub fn wire(&mut self, ctx: &WiringContext) -> Result<()> {
        if self.wired {
            return Ok(());
        }
        match &self.source {
            SourceBehavior::Live(input) => live::wire(self, *input, ctx)?,
            SourceBehavior::Cloned(source) => cloned::wire(self, source, ctx)?,
        }
        self.wired = true;
        Ok(())
    }

    /// Drop every action still waiting on this snippet's events
    pub(crate) fn release(&self) -> usize {
        let mut dropped = self.shared.start().discard_actions() + self.shared.end().discard_actions();
        if let Some(stop) = &self.playback_end {
            dropped += stop.discard_actions();
        }
        dropped
    }
}

impl fmt::Debug for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snippet")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("source", &self.source)
            .field("length", self.shared.length())
            .field("repeat", &self.repeat)
            .field("effects", &self.effects)
            .field("monitoring", &self.monitoring)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_from_integer() {
        assert_eq!(Repeat::try_from(-1), Ok(Repeat::Forever));
        assert_eq!(Repeat::try_from(0), Ok(Repeat::Disabled));
        assert_eq!(Repeat::try_from(1), Ok(Repeat::Once));
        assert_eq!(Repeat::try_from(4), Ok(Repeat::Times(4)));
        assert_eq!(
            Repeat::try_from(-2),
            Err(ConstructionError::InvalidRepeat(-2))
        );
    }

    #[test]
    fn test_repeat_count_round_trip() {
        for count in [-1, 0, 1, 2, 16] {
            assert_eq!(Repeat::try_from(count).unwrap().count(), count);
        }
        assert!(Repeat::Forever.loops());
        assert!(Repeat::Times(3).loops());
        assert!(!Repeat::Once.loops());
        assert_eq!(Repeat::default(), Repeat::Once);
    }
}
