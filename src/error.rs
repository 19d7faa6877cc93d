// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the looper engine.
//!
//! Errors fall into four families: construction errors raised while a
//! program is being declared, temporal errors raised when something reads a
//! time or duration that does not exist yet, double fires, and unsupported
//! snippet combinations. None of them are retried.

use thiserror::Error;

use crate::events::EventId;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// A snippet was declared with invalid parameters
    #[error("invalid snippet: {0}")]
    Construction(#[from] ConstructionError),

    /// A time or duration was read before it could be known
    #[error("temporal access error: {0}")]
    Temporal(#[from] TemporalError),

    /// An event was fired a second time
    #[error("event {event} has already fired")]
    DoubleFire { event: EventId },

    /// The requested snippet combination is not implemented
    #[error("unsupported snippet: {0}")]
    Unsupported(#[from] UnsupportedCombination),

    /// The audio backend rejected an operation
    #[error("audio backend error: {0}")]
    Backend(#[from] BackendError),

    /// The trigger source failed
    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// The dispatcher owning this event has been released
    #[error("dispatcher has been torn down")]
    TornDown,

    /// Snippet wiring was requested twice
    #[error("program has already been instantiated")]
    AlreadyInstantiated,
}

/// Invalid length or repeat specification on `add_snippet`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("cannot specify both an end event and a duration")]
    ConflictingLength,

    #[error("a live input snippet needs either an end event or a duration")]
    MissingLength,

    #[error("repeat is not an option for live input snippets")]
    RepeatOnLiveInput,

    #[error("cannot combine an explicit length with repeat = {repeat}")]
    RepeatWithExplicitLength { repeat: i64 },

    #[error("repeat must be -1, 0 or a positive count, got {0}")]
    InvalidRepeat(i64),
}

/// Reading a time or duration before it exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalError {
    #[error("event {0} has not fired yet")]
    NotYetFired(EventId),

    #[error("duration of '{0}' cannot be resolved yet")]
    DurationUnresolved(String),

    #[error("'{0}' has no finalized recording to play back")]
    BufferUnavailable(String),
}

/// Snippet shapes the engine deliberately refuses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedCombination {
    #[error("cloned snippets bounded by an end event are not implemented")]
    ClonedEventBounded,

    #[error("cloning a cloned snippet ('{0}') is not implemented")]
    CloneOfClone(String),
}

/// Audio backend failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("audio backend is not booted")]
    NotBooted,

    #[error("no audio device available")]
    NoDevice,

    #[error("audio initialization failed: {0}")]
    InitFailed(String),

    #[error("audio stream failed: {0}")]
    StreamFailed(String),

    #[error("unknown capture handle {0}")]
    UnknownCapture(u64),

    #[error("failed to acquire audio lock")]
    LockFailed,
}

/// Trigger source failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// The source will never produce another trigger
    #[error("trigger source closed")]
    Closed,

    #[error("trigger device error: {0}")]
    Device(String),
}
