// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio capability for the looper engine.
//!
//! The engine never touches samples itself. It sequences calls to an
//! [`AudioBackend`] through opaque handles:
//! - a raw input stream per live snippet
//! - capture into a growable or pre-sized buffer, finalized to an exact length
//! - playback of a finalized buffer, once or looped
//! - routing a stream to the output (monitoring)
//!
//! This module provides:
//! - the backend and effect traits plus the handle types
//! - built-in effects
//! - an in-memory simulated backend
//! - a cpal device backend (feature `hardware`)

pub mod effects;
pub mod simulated;

#[cfg(feature = "hardware")]
pub mod device;

pub use effects::{Gain, PitchShift};
pub use simulated::{BackendOp, SimulatedBackend};

#[cfg(feature = "hardware")]
pub use device::DeviceBackend;

use std::fmt;
use std::sync::Arc;

use crate::error::BackendError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Reference to a live input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputRef {
    /// Input channel on the audio device
    pub channel: u16,
}

impl InputRef {
    /// Input on a specific device channel
    pub fn channel(channel: u16) -> Self {
        Self { channel }
    }
}

/// Identifier of an active playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

/// Where a stream's audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// Live input
    Input(InputRef),
    /// Output of a playback
    Playback(PlaybackId),
}

/// A processing stage appended by an effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Linear gain
    Gain { factor: f32 },
    /// Pitch shift in semitones
    PitchShift { semitones: f32 },
}

/// Opaque description of an audio stream: a source plus processing stages
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHandle {
    source: StreamSource,
    stages: Vec<Stage>,
}

impl StreamHandle {
    /// Unprocessed stream from `source`
    pub fn new(source: StreamSource) -> Self {
        Self {
            source,
            stages: Vec::new(),
        }
    }

    /// Stream source
    pub fn source(&self) -> StreamSource {
        self.source
    }

    /// Processing stages in application order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A new stream with `stage` appended
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }
}

/// Opaque handle to an in-progress capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureHandle(pub u64);

/// Buffer to capture into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureBuffer {
    /// Length unknown up front; starts at `initial_seconds` and grows
    Growable { initial_seconds: f64 },
    /// Exactly `seconds` long
    Fixed { seconds: f64 },
}

impl CaptureBuffer {
    /// Growable buffer starting at `initial_seconds`
    pub fn growable(initial_seconds: f64) -> Self {
        CaptureBuffer::Growable { initial_seconds }
    }

    /// Pre-sized buffer
    pub fn fixed(seconds: f64) -> Self {
        CaptureBuffer::Fixed { seconds }
    }

    /// Upper bound on captured seconds, if any
    pub fn capacity_seconds(&self) -> Option<f64> {
        match self {
            CaptureBuffer::Growable { .. } => None,
            CaptureBuffer::Fixed { seconds } => Some(*seconds),
        }
    }
}

/// Immutable recorded audio, interleaved
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Arc<[f32]>,
}

impl AudioBuffer {
    /// Wrap interleaved samples
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: samples.into(),
        }
    }

    /// Silent buffer of `frames` frames
    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        let channels = channels.max(1);
        Self::new(sample_rate, channels, vec![0.0; frames * channels as usize])
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Length in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Whether two handles share the same sample storage
    pub fn shares_storage(&self, other: &AudioBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Frames covering `seconds` at `sample_rate`; negative lengths are empty
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// An active playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackHandle {
    id: PlaybackId,
    looping: bool,
}

impl PlaybackHandle {
    /// Describe a playback
    pub fn new(id: PlaybackId, looping: bool) -> Self {
        Self { id, looping }
    }

    /// Playback identifier
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Whether the playback loops
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// The playback's output as a stream
    pub fn output(&self) -> StreamHandle {
        StreamHandle::new(StreamSource::Playback(self.id))
    }
}

/// Audio backend capability.
///
/// Implementations must be callable from the dispatch thread while their
/// own audio threads run.
pub trait AudioBackend: Send + Sync {
    /// Start the backend. Called once before any snippet is wired.
    fn boot(&self) -> BackendResult<()>;

    /// Release every resource. Later calls may fail with `NotBooted`.
    fn shutdown(&self);

    /// Raw stream from a live input
    fn raw_stream(&self, input: &InputRef) -> BackendResult<StreamHandle>;

    /// Start capturing `stream` into a new buffer
    fn begin_capture(
        &self,
        stream: &StreamHandle,
        buffer: CaptureBuffer,
    ) -> BackendResult<CaptureHandle>;

    /// Stop a capture and trim it to exactly `seconds`
    fn finalize_capture(&self, capture: CaptureHandle, seconds: f64) -> BackendResult<AudioBuffer>;

    /// Start playing a finalized buffer
    fn start_playback(&self, buffer: &AudioBuffer, looping: bool) -> BackendResult<PlaybackHandle>;

    /// Stop a playback
    fn stop_playback(&self, playback: &PlaybackHandle) -> BackendResult<()>;

    /// Send a stream to the output
    fn route_to_output(&self, stream: &StreamHandle) -> BackendResult<()>;

    /// Stop sending a stream to the output
    fn stop_routing(&self, stream: &StreamHandle) -> BackendResult<()>;
}

/// A pure transform over a stream, applied in declaration order
pub trait Effect: Send + Sync + fmt::Debug {
    /// Effect name for logs
    fn name(&self) -> &str;

    /// Transform the stream
    fn apply(&self, stream: StreamHandle) -> StreamHandle;
}

/// Apply effects in order
pub fn apply_effects(stream: StreamHandle, effects: &[Arc<dyn Effect>]) -> StreamHandle {
    effects
        .iter()
        .fold(stream, |stream, effect| effect.apply(stream))
}
