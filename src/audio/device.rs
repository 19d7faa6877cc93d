// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio device backend via cpal.
//!
//! The cpal streams live on a dedicated `audio-io` thread (streams are not
//! `Send` on every platform). Stream callbacks and engine calls meet in a
//! shared [`DeviceState`]; callbacks only `try_lock` it and produce silence
//! when contended.
//!
//! Processing is limited to what the engine sequences: capture of one input
//! channel, looped or one-shot playback, pass-through, and gain. Pitch
//! stages are accepted and ignored.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tracing::{debug, error, info};

use super::{
    seconds_to_frames, AudioBackend, AudioBuffer, BackendResult, CaptureBuffer, CaptureHandle,
    InputRef, PlaybackHandle, PlaybackId, Stage, StreamHandle, StreamSource,
};
use crate::error::BackendError;

/// Pass-through queue limit, in frames
const MONITOR_QUEUE_FRAMES: usize = 4_096;

fn gain_of(stream: &StreamHandle) -> f32 {
    stream
        .stages()
        .iter()
        .map(|stage| match stage {
            Stage::Gain { factor } => *factor,
            Stage::PitchShift { .. } => 1.0,
        })
        .product()
}

#[derive(Debug)]
struct Capture {
    channel: usize,
    samples: Vec<f32>,
    limit_frames: Option<usize>,
}

#[derive(Debug)]
struct Playback {
    buffer: AudioBuffer,
    position: usize,
    looping: bool,
    gain: Option<f32>,
}

/// State shared between the engine and the stream callbacks
#[derive(Debug)]
pub(crate) struct DeviceState {
    sample_rate: u32,
    channels: u16,
    next_id: u64,
    captures: HashMap<CaptureHandle, Capture>,
    playbacks: BTreeMap<PlaybackId, Playback>,
    passthrough: HashMap<u16, f32>,
    monitor: VecDeque<f32>,
}

impl DeviceState {
    fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            next_id: 0,
            captures: HashMap::new(),
            playbacks: BTreeMap::new(),
            passthrough: HashMap::new(),
            monitor: VecDeque::new(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Consume one input callback's interleaved samples
    fn capture_input(&mut self, data: &[f32], input_channels: usize) {
        let input_channels = input_channels.max(1);
        let out_channels = self.channels as usize;

        for frame in data.chunks(input_channels) {
            for capture in self.captures.values_mut() {
                let full = capture
                    .limit_frames
                    .is_some_and(|limit| capture.samples.len() / out_channels >= limit);
                if full {
                    continue;
                }
                let sample = frame.get(capture.channel).copied().unwrap_or(0.0);
                capture
                    .samples
                    .extend(std::iter::repeat(sample).take(out_channels));
            }

            if !self.passthrough.is_empty() {
                let mixed: f32 = self
                    .passthrough
                    .iter()
                    .map(|(channel, gain)| {
                        frame.get(*channel as usize).copied().unwrap_or(0.0) * gain
                    })
                    .sum();
                if self.monitor.len() < MONITOR_QUEUE_FRAMES * out_channels {
                    self.monitor
                        .extend(std::iter::repeat(mixed).take(out_channels));
                }
            }
        }
    }

    /// Fill one output callback's interleaved buffer
    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let out_channels = self.channels as usize;

        for sample in out.iter_mut() {
            if let Some(monitored) = self.monitor.pop_front() {
                *sample += monitored;
            }
        }

        self.playbacks.retain(|_, playback| {
            let samples = playback.buffer.samples();
            if samples.is_empty() {
                return false;
            }
            let buffer_channels = playback.buffer.channels() as usize;
            let frames = playback.buffer.frames();

            for frame in out.chunks_mut(out_channels) {
                if playback.position >= frames {
                    if !playback.looping {
                        return false;
                    }
                    playback.position = 0;
                }
                if let Some(gain) = playback.gain {
                    let start = playback.position * buffer_channels;
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        *sample += samples[start + ch.min(buffer_channels - 1)] * gain;
                    }
                }
                playback.position += 1;
            }
            playback.looping || playback.position < frames
        });
    }
}

struct IoThread {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Backend driving the default input and output devices
pub struct DeviceBackend {
    state: Arc<Mutex<DeviceState>>,
    io: Mutex<Option<IoThread>>,
}

impl DeviceBackend {
    /// Backend at the given format; devices open on `boot`
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState::new(sample_rate, channels))),
            io: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn io(&self) -> MutexGuard<'_, Option<IoThread>> {
        self.io.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_booted(&self) -> BackendResult<()> {
        if self.io().is_some() {
            Ok(())
        } else {
            Err(BackendError::NotBooted)
        }
    }
}

/// Open and start both streams; they stop when dropped
fn open_streams(
    state: Arc<Mutex<DeviceState>>,
) -> BackendResult<(cpal::Stream, cpal::Stream)> {
    let (sample_rate, channels) = {
        let state = state.lock().map_err(|_| BackendError::LockFailed)?;
        (state.sample_rate, state.channels)
    };

    let host = cpal::default_host();
    let input = host.default_input_device().ok_or(BackendError::NoDevice)?;
    let output = host.default_output_device().ok_or(BackendError::NoDevice)?;

    let input_channels = input
        .default_input_config()
        .map_err(|e| BackendError::InitFailed(format!("Failed to get input config: {}", e)))?
        .channels();

    let input_config = StreamConfig {
        channels: input_channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let output_config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let capture_state = Arc::clone(&state);
    let input_stream = input
        .build_input_stream(
            &input_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut state) = capture_state.try_lock() {
                    state.capture_input(data, input_channels as usize);
                }
            },
            move |err| {
                error!("audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| BackendError::StreamFailed(format!("Failed to build input stream: {}", e)))?;

    let render_state = Arc::clone(&state);
    let output_stream = output
        .build_output_stream(
            &output_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match render_state.try_lock() {
                Ok(mut state) => state.render(data),
                Err(_) => data.fill(0.0),
            },
            move |err| {
                error!("audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| BackendError::StreamFailed(format!("Failed to build output stream: {}", e)))?;

    input_stream
        .play()
        .map_err(|e| BackendError::StreamFailed(format!("Failed to start input: {}", e)))?;
    output_stream
        .play()
        .map_err(|e| BackendError::StreamFailed(format!("Failed to start output: {}", e)))?;

    info!(
        input = %input.name().unwrap_or_default(),
        output = %output.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio devices open"
    );
    Ok((input_stream, output_stream))
}

impl AudioBackend for DeviceBackend {
    fn boot(&self) -> BackendResult<()> {
        let mut io = self.io();
        if io.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop, stop_rx) = mpsc::channel::<()>();
        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name("audio-io".into())
            .spawn(move || match open_streams(state) {
                Ok(streams) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(streams);
                    debug!("audio streams closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| BackendError::InitFailed(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| BackendError::InitFailed("audio thread exited".into()))??;
        *io = Some(IoThread { stop, handle });
        Ok(())
    }

    fn shutdown(&self) {
        let io = self.io().take();
        if let Some(io) = io {
            let _ = io.stop.send(());
            if io.handle.join().is_err() {
                error!("audio thread panicked");
            }
        }
        let mut state = self.state();
        state.captures.clear();
        state.playbacks.clear();
        state.passthrough.clear();
        state.monitor.clear();
    }

    fn raw_stream(&self, input: &InputRef) -> BackendResult<StreamHandle> {
        self.require_booted()?;
        Ok(StreamHandle::new(StreamSource::Input(*input)))
    }

    fn begin_capture(
        &self,
        stream: &StreamHandle,
        buffer: CaptureBuffer,
    ) -> BackendResult<CaptureHandle> {
        self.require_booted()?;
        let StreamSource::Input(input) = stream.source() else {
            return Err(BackendError::StreamFailed(
                "only live inputs can be captured".into(),
            ));
        };

        let mut state = self.state();
        let sample_rate = state.sample_rate;
        let channels = state.channels as usize;
        let (reserve, limit_frames) = match buffer {
            CaptureBuffer::Growable { initial_seconds } => {
                (seconds_to_frames(initial_seconds, sample_rate), None)
            }
            CaptureBuffer::Fixed { seconds } => {
                let frames = seconds_to_frames(seconds, sample_rate);
                (frames, Some(frames))
            }
        };

        let capture = CaptureHandle(state.next_id());
        state.captures.insert(
            capture,
            Capture {
                channel: input.channel as usize,
                samples: Vec::with_capacity(reserve * channels),
                limit_frames,
            },
        );
        Ok(capture)
    }

    fn finalize_capture(&self, capture: CaptureHandle, seconds: f64) -> BackendResult<AudioBuffer> {
        let mut state = self.state();
        let mut taken = state
            .captures
            .remove(&capture)
            .ok_or(BackendError::UnknownCapture(capture.0))?;

        let channels = state.channels;
        let frames = seconds_to_frames(seconds, state.sample_rate);
        taken.samples.resize(frames * channels as usize, 0.0);
        Ok(AudioBuffer::new(state.sample_rate, channels, taken.samples))
    }

    fn start_playback(&self, buffer: &AudioBuffer, looping: bool) -> BackendResult<PlaybackHandle> {
        self.require_booted()?;
        let mut state = self.state();
        let id = PlaybackId(state.next_id());
        state.playbacks.insert(
            id,
            Playback {
                buffer: buffer.clone(),
                position: 0,
                looping,
                gain: None,
            },
        );
        Ok(PlaybackHandle::new(id, looping))
    }

    fn stop_playback(&self, playback: &PlaybackHandle) -> BackendResult<()> {
        self.state().playbacks.remove(&playback.id());
        Ok(())
    }

    fn route_to_output(&self, stream: &StreamHandle) -> BackendResult<()> {
        self.require_booted()?;
        let gain = gain_of(stream);
        let mut state = self.state();
        match stream.source() {
            StreamSource::Input(input) => {
                state.passthrough.insert(input.channel, gain);
            }
            StreamSource::Playback(id) => {
                if let Some(playback) = state.playbacks.get_mut(&id) {
                    playback.gain = Some(gain);
                }
            }
        }
        Ok(())
    }

    fn stop_routing(&self, stream: &StreamHandle) -> BackendResult<()> {
        let mut state = self.state();
        match stream.source() {
            StreamSource::Input(input) => {
                state.passthrough.remove(&input.channel);
                if state.passthrough.is_empty() {
                    state.monitor.clear();
                }
            }
            StreamSource::Playback(id) => {
                if let Some(playback) = state.playbacks.get_mut(&id) {
                    playback.gain = None;
                }
            }
        }
        Ok(())
    }
}

impl Drop for DeviceBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Names of the available input and output devices
pub fn list_devices() -> (Vec<String>, Vec<String>) {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default();
    let outputs = host
        .output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default();
    (inputs, outputs)
}
