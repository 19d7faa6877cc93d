// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-memory audio backend.
//!
//! Records every call it receives and produces silent buffers of the exact
//! requested length. Used for dry runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{
    seconds_to_frames, AudioBackend, AudioBuffer, BackendResult, CaptureBuffer, CaptureHandle,
    InputRef, PlaybackHandle, PlaybackId, StreamHandle, StreamSource,
};
use crate::error::BackendError;

/// A call received by the simulated backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    Boot,
    Shutdown,
    RawStream { input: InputRef },
    BeginCapture { capture: CaptureHandle, buffer: CaptureBuffer },
    FinalizeCapture { capture: CaptureHandle, seconds: f64, frames: usize },
    StartPlayback { playback: PlaybackId, looping: bool, frames: usize },
    StopPlayback { playback: PlaybackId },
    Route { stream: StreamHandle },
    StopRouting { stream: StreamHandle },
}

#[derive(Debug, Default)]
struct SimState {
    booted: bool,
    next_id: u64,
    captures: HashMap<CaptureHandle, (StreamHandle, CaptureBuffer)>,
    playbacks: BTreeMap<PlaybackId, PlaybackHandle>,
    routed: Vec<StreamHandle>,
    ops: Vec<BackendOp>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_booted(&self) -> BackendResult<()> {
        if self.booted {
            Ok(())
        } else {
            Err(BackendError::NotBooted)
        }
    }
}

/// Backend that simulates audio I/O in memory
#[derive(Debug)]
pub struct SimulatedBackend {
    sample_rate: u32,
    channels: u16,
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    /// Create a backend at 48 kHz stereo
    pub fn new() -> Self {
        Self::with_format(48_000, 2)
    }

    /// Create a backend with a specific format
    pub fn with_format(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            state: Mutex::new(SimState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the backend is booted
    pub fn is_booted(&self) -> bool {
        self.state().booted
    }

    /// Every call received so far
    pub fn ops(&self) -> Vec<BackendOp> {
        self.state().ops.clone()
    }

    /// Playbacks that have started and not stopped
    pub fn active_playbacks(&self) -> Vec<PlaybackHandle> {
        self.state().playbacks.values().cloned().collect()
    }

    /// Streams currently routed to the output
    pub fn routed(&self) -> Vec<StreamHandle> {
        self.state().routed.clone()
    }

    /// Number of captures in progress
    pub fn active_captures(&self) -> usize {
        self.state().captures.len()
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for SimulatedBackend {
    fn boot(&self) -> BackendResult<()> {
        let mut state = self.state();
        state.booted = true;
        state.ops.push(BackendOp::Boot);
        debug!(sample_rate = self.sample_rate, channels = self.channels, "simulated backend booted");
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state();
        state.booted = false;
        state.captures.clear();
        state.playbacks.clear();
        state.routed.clear();
        state.ops.push(BackendOp::Shutdown);
    }

    fn raw_stream(&self, input: &InputRef) -> BackendResult<StreamHandle> {
        let mut state = self.state();
        state.require_booted()?;
        state.ops.push(BackendOp::RawStream { input: *input });
        Ok(StreamHandle::new(StreamSource::Input(*input)))
    }

    fn begin_capture(
        &self,
        stream: &StreamHandle,
        buffer: CaptureBuffer,
    ) -> BackendResult<CaptureHandle> {
        let mut state = self.state();
        state.require_booted()?;
        let capture = CaptureHandle(state.next_id());
        state.captures.insert(capture, (stream.clone(), buffer));
        state.ops.push(BackendOp::BeginCapture { capture, buffer });
        Ok(capture)
    }

    fn finalize_capture(&self, capture: CaptureHandle, seconds: f64) -> BackendResult<AudioBuffer> {
        let mut state = self.state();
        state.require_booted()?;
        let (_, buffer) = state
            .captures
            .remove(&capture)
            .ok_or(BackendError::UnknownCapture(capture.0))?;

        let seconds = match buffer.capacity_seconds() {
            Some(capacity) => seconds.min(capacity),
            None => seconds,
        };
        let frames = seconds_to_frames(seconds, self.sample_rate);
        state.ops.push(BackendOp::FinalizeCapture {
            capture,
            seconds,
            frames,
        });

        Ok(AudioBuffer::silence(self.sample_rate, self.channels, frames))
    }

    fn start_playback(&self, buffer: &AudioBuffer, looping: bool) -> BackendResult<PlaybackHandle> {
        let mut state = self.state();
        state.require_booted()?;
        let playback = PlaybackId(state.next_id());
        let handle = PlaybackHandle::new(playback, looping);
        state.playbacks.insert(playback, handle.clone());
        state.ops.push(BackendOp::StartPlayback {
            playback,
            looping,
            frames: buffer.frames(),
        });
        Ok(handle)
    }

    fn stop_playback(&self, playback: &PlaybackHandle) -> BackendResult<()> {
        let mut state = self.state();
        state.require_booted()?;
        state.playbacks.remove(&playback.id());
        state.ops.push(BackendOp::StopPlayback {
            playback: playback.id(),
        });
        Ok(())
    }

    fn route_to_output(&self, stream: &StreamHandle) -> BackendResult<()> {
        let mut state = self.state();
        state.require_booted()?;
        state.routed.push(stream.clone());
        state.ops.push(BackendOp::Route {
            stream: stream.clone(),
        });
        Ok(())
    }

    fn stop_routing(&self, stream: &StreamHandle) -> BackendResult<()> {
        let mut state = self.state();
        state.require_booted()?;
        state.routed.retain(|routed| routed != stream);
        state.ops.push(BackendOp::StopRouting {
            stream: stream.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_boot() {
        let backend = SimulatedBackend::new();
        assert_eq!(
            backend.raw_stream(&InputRef::default()),
            Err(BackendError::NotBooted)
        );
    }

    #[test]
    fn test_capture_exact_length() {
        let backend = SimulatedBackend::with_format(48_000, 2);
        backend.boot().unwrap();

        let stream = backend.raw_stream(&InputRef::default()).unwrap();
        let capture = backend
            .begin_capture(&stream, CaptureBuffer::growable(60.0))
            .unwrap();
        assert_eq!(backend.active_captures(), 1);

        let buffer = backend.finalize_capture(capture, 2.5).unwrap();
        assert_eq!(buffer.frames(), 120_000);
        assert_eq!(buffer.duration_seconds(), 2.5);
        assert_eq!(backend.active_captures(), 0);
    }

    #[test]
    fn test_fixed_capture_is_capped() {
        let backend = SimulatedBackend::with_format(1_000, 1);
        backend.boot().unwrap();

        let stream = backend.raw_stream(&InputRef::default()).unwrap();
        let capture = backend
            .begin_capture(&stream, CaptureBuffer::fixed(1.0))
            .unwrap();
        let buffer = backend.finalize_capture(capture, 3.0).unwrap();
        assert_eq!(buffer.frames(), 1_000);
    }

    #[test]
    fn test_unknown_capture() {
        let backend = SimulatedBackend::new();
        backend.boot().unwrap();
        assert_eq!(
            backend.finalize_capture(CaptureHandle(99), 1.0),
            Err(BackendError::UnknownCapture(99))
        );
    }

    #[test]
    fn test_playback_and_routing() {
        let backend = SimulatedBackend::new();
        backend.boot().unwrap();

        let buffer = AudioBuffer::silence(48_000, 2, 480);
        let playback = backend.start_playback(&buffer, true).unwrap();
        backend.route_to_output(&playback.output()).unwrap();

        assert_eq!(backend.active_playbacks(), vec![playback.clone()]);
        assert_eq!(backend.routed(), vec![playback.output()]);

        backend.stop_routing(&playback.output()).unwrap();
        backend.stop_playback(&playback).unwrap();
        assert!(backend.active_playbacks().is_empty());
        assert!(backend.routed().is_empty());
    }

    #[test]
    fn test_shutdown_clears_state() {
        let backend = SimulatedBackend::new();
        backend.boot().unwrap();
        let buffer = AudioBuffer::silence(48_000, 2, 480);
        backend.start_playback(&buffer, false).unwrap();

        backend.shutdown();
        assert!(!backend.is_booted());
        assert!(backend.active_playbacks().is_empty());
        assert_eq!(backend.ops().last(), Some(&BackendOp::Shutdown));
    }
}
