// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Built-in effects.
//!
//! Effects only describe processing by appending a [`Stage`] to a stream;
//! rendering the stage is up to the backend.

use super::{Effect, Stage, StreamHandle};

/// Linear gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    factor: f32,
}

impl Gain {
    /// Gain by a linear factor (clamped to 0.0 - 4.0)
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.clamp(0.0, 4.0),
        }
    }

    /// Gain in decibels
    pub fn from_db(db: f32) -> Self {
        Self::new(10f32.powf(db / 20.0))
    }

    /// Linear factor
    pub fn factor(&self) -> f32 {
        self.factor
    }
}

impl Effect for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn apply(&self, stream: StreamHandle) -> StreamHandle {
        stream.with_stage(Stage::Gain {
            factor: self.factor,
        })
    }
}

/// Pitch shift by an interval in semitones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShift {
    semitones: f32,
}

impl PitchShift {
    /// Shift by `semitones` (clamped to +/- 48)
    pub fn new(semitones: f32) -> Self {
        Self {
            semitones: semitones.clamp(-48.0, 48.0),
        }
    }

    /// Interval in semitones
    pub fn semitones(&self) -> f32 {
        self.semitones
    }
}

impl Effect for PitchShift {
    fn name(&self) -> &str {
        "pitch-shift"
    }

    fn apply(&self, stream: StreamHandle) -> StreamHandle {
        stream.with_stage(Stage::PitchShift {
            semitones: self.semitones,
        })
    }
}
