// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Wiring for snippets fed by a live input.
//!
//! The raw stream is taken once, at wiring time, and every effect is applied
//! to it before capture and monitoring. Capture is only armed when another
//! snippet clones this one.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::{LengthBehavior, Length, Snippet, WiringContext};
use crate::audio::{apply_effects, CaptureBuffer, CaptureHandle, InputRef, StreamHandle};
use crate::error::{Result, TemporalError};

type CaptureSlot = Arc<Mutex<Option<CaptureHandle>>>;

fn lock(slot: &CaptureSlot) -> MutexGuard<'_, Option<CaptureHandle>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Capture buffer choice for a live snippet
#[derive(Debug, Clone)]
enum Sizing {
    /// Buffer known at wiring time
    Known(CaptureBuffer),
    /// Length resolves when the start event fires
    OnStart(Length),
}

impl Sizing {
    fn for_length(length: &LengthBehavior, initial_seconds: f64) -> Self {
        match length {
            LengthBehavior::EventBounded { .. } => {
                Sizing::Known(CaptureBuffer::growable(initial_seconds))
            }
            LengthBehavior::DurationDerived { declared, .. } => match declared.try_seconds() {
                Some(seconds) => Sizing::Known(CaptureBuffer::fixed(seconds.max(0.0))),
                None => Sizing::OnStart(declared.clone()),
            },
        }
    }

    fn buffer(&self) -> Result<CaptureBuffer> {
        match self {
            Sizing::Known(buffer) => Ok(*buffer),
            Sizing::OnStart(length) => Ok(CaptureBuffer::fixed(length.seconds()?.max(0.0))),
        }
    }
}

pub(super) fn wire(snippet: &Snippet, input: InputRef, ctx: &WiringContext) -> Result<()> {
    let handle = snippet.handle();
    let stream = apply_effects(ctx.backend.raw_stream(&input)?, snippet.effects());

    debug!(
        snippet = handle.name(),
        start = %handle.start(),
        end = %handle.end(),
        recording = handle.is_recording(),
        monitoring = snippet.is_monitoring(),
        "wiring live snippet"
    );

    if handle.is_recording() {
        wire_capture(snippet, &stream, ctx);
    }
    if snippet.is_monitoring() {
        wire_monitoring(snippet, &stream, ctx);
    }
    Ok(())
}

fn wire_capture(snippet: &Snippet, stream: &StreamHandle, ctx: &WiringContext) {
    let handle = snippet.handle();
    let sizing = Sizing::for_length(handle.length(), ctx.initial_capture_seconds);
    let slot = CaptureSlot::default();

    {
        let backend = Arc::clone(&ctx.backend);
        let indicator = Arc::clone(&ctx.indicator);
        let stream = stream.clone();
        let slot = Arc::clone(&slot);
        let name = handle.name().to_string();
        handle.start().add_action(move || {
            let buffer = sizing.buffer()?;
            let capture = backend.begin_capture(&stream, buffer)?;
            *lock(&slot) = Some(capture);
            indicator.recording_started(&name);
            Ok(())
        });
    }

    let backend = Arc::clone(&ctx.backend);
    let indicator = Arc::clone(&ctx.indicator);
    let owner = handle.clone();
    handle.end().add_action(move || {
        let capture = lock(&slot)
            .take()
            .ok_or_else(|| TemporalError::NotYetFired(owner.start().id()))?;
        let seconds = owner
            .resolved_seconds()
            .ok_or_else(|| TemporalError::DurationUnresolved(owner.name().to_string()))?;

        let take = backend.finalize_capture(capture, seconds)?;
        info!(
            snippet = owner.name(),
            seconds,
            frames = take.frames(),
            "take recorded"
        );
        owner.store_take(take);
        indicator.recording_stopped(owner.name(), seconds);
        Ok(())
    });
}

fn wire_monitoring(snippet: &Snippet, stream: &StreamHandle, ctx: &WiringContext) {
    let handle = snippet.handle();

    {
        let backend = Arc::clone(&ctx.backend);
        let indicator = Arc::clone(&ctx.indicator);
        let stream = stream.clone();
        let name = handle.name().to_string();
        handle.start().add_action(move || {
            backend.route_to_output(&stream)?;
            indicator.monitoring_started(&name);
            Ok(())
        });
    }

    let backend = Arc::clone(&ctx.backend);
    let indicator = Arc::clone(&ctx.indicator);
    let stream = stream.clone();
    let name = handle.name().to_string();
    handle.end().add_action(move || {
        backend.stop_routing(&stream)?;
        indicator.monitoring_stopped(&name);
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBackend, BackendOp, Gain, SimulatedBackend, Stage, StreamSource};
    use crate::control::{IndicatorSignal, MemoryIndicator};
    use crate::events::Dispatcher;
    use crate::program::Track;
    use crate::snippet::SnippetSpec;
    use crate::timing::ManualClock;

    struct Rig {
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
        backend: Arc<SimulatedBackend>,
        indicator: Arc<MemoryIndicator>,
    }

    impl Rig {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new());
            let backend = Arc::new(SimulatedBackend::with_format(1_000, 1));
            backend.boot().unwrap();
            Self {
                dispatcher: Dispatcher::new(clock.clone()),
                clock,
                backend,
                indicator: Arc::new(MemoryIndicator::new()),
            }
        }

        fn wire(&self, track: &mut Track) {
            let ctx = WiringContext {
                backend: self.backend.clone(),
                indicator: self.indicator.clone(),
                initial_capture_seconds: 60.0,
            };
            for snippet in track.snippets_mut() {
                snippet.wire(&ctx).unwrap();
            }
        }
    }

    #[test]
    fn test_monitor_only_skips_capture() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("vox");
        track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), events.boot())
                    .ending_at(events.button_press()),
            )
            .unwrap();
        rig.wire(&mut track);

        rig.dispatcher.boot().unwrap();
        assert_eq!(rig.backend.routed().len(), 1);
        rig.dispatcher.press_next().unwrap();

        assert!(rig.backend.routed().is_empty());
        assert!(!rig
            .backend
            .ops()
            .iter()
            .any(|op| matches!(op, BackendOp::BeginCapture { .. })));
        assert_eq!(
            rig.indicator.signals(),
            vec![
                IndicatorSignal::MonitoringStarted("snippet 1".into()),
                IndicatorSignal::MonitoringStopped("snippet 1".into()),
            ]
        );
    }

    #[test]
    fn test_event_bounded_capture() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("guitar");
        let riff = track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), events.boot())
                    .ending_at(events.button_press())
                    .monitoring(false)
                    .named("riff"),
            )
            .unwrap();
        riff.mark_recording();
        rig.wire(&mut track);

        rig.dispatcher.boot().unwrap();
        assert_eq!(rig.backend.active_captures(), 1);
        rig.clock.advance_secs(2.5);
        rig.dispatcher.press_next().unwrap();

        let take = riff.take().unwrap();
        assert_eq!(take.frames(), 2_500);
        assert_eq!(take.duration_seconds(), 2.5);
        assert_eq!(
            rig.indicator.signals(),
            vec![
                IndicatorSignal::RecordingStarted("riff".into()),
                IndicatorSignal::RecordingStopped("riff".into(), 2.5),
            ]
        );
        assert!(rig.backend.ops().contains(&BackendOp::BeginCapture {
            capture: CaptureHandle(1),
            buffer: CaptureBuffer::growable(60.0),
        }));
    }

    #[test]
    fn test_fixed_length_presizes_buffer() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("pad");
        let pad = track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), events.boot())
                    .lasting(4.0)
                    .monitoring(false),
            )
            .unwrap();
        pad.mark_recording();
        rig.wire(&mut track);

        rig.dispatcher.boot().unwrap();
        assert!(rig.backend.ops().iter().any(|op| matches!(
            op,
            BackendOp::BeginCapture { buffer, .. } if *buffer == CaptureBuffer::fixed(4.0)
        )));

        rig.clock.advance_secs(4.0);
        rig.dispatcher.fire_due().unwrap();
        assert_eq!(pad.take().unwrap().duration_seconds(), 4.0);
    }

    #[test]
    fn test_deferred_length_sizes_buffer_on_start() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("bass");
        let intro = track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), events.boot())
                    .ending_at(events.button_press())
                    .monitoring(false),
            )
            .unwrap();
        let double = track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), intro.end().clone())
                    .lasting(intro.duration() * 2.0)
                    .monitoring(false),
            )
            .unwrap();
        double.mark_recording();
        rig.wire(&mut track);

        rig.dispatcher.boot().unwrap();
        rig.clock.advance_secs(1.5);
        rig.dispatcher.press_next().unwrap();
        rig.dispatcher.fire_due().unwrap();

        assert!(rig.backend.ops().iter().any(|op| matches!(
            op,
            BackendOp::BeginCapture { buffer, .. } if *buffer == CaptureBuffer::fixed(3.0)
        )));
        rig.clock.advance_secs(3.0);
        rig.dispatcher.fire_due().unwrap();
        assert_eq!(double.take().unwrap().duration_seconds(), 3.0);
    }

    #[test]
    fn test_effects_applied_before_monitoring() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("fx");
        track
            .add_snippet(
                SnippetSpec::live(InputRef::channel(3), events.boot())
                    .ending_at(events.button_press())
                    .effect(Gain::new(0.5)),
            )
            .unwrap();
        rig.wire(&mut track);
        rig.dispatcher.boot().unwrap();

        let routed = rig.backend.routed();
        assert_eq!(routed[0].source(), StreamSource::Input(InputRef::channel(3)));
        assert_eq!(routed[0].stages(), &[Stage::Gain { factor: 0.5 }]);
    }

    #[test]
    fn test_end_before_start_is_temporal_error() {
        let rig = Rig::new();
        let events = rig.dispatcher.handle();
        let mut track = Track::new("late");
        let late = track
            .add_snippet(
                SnippetSpec::live(InputRef::default(), events.button_press())
                    .ending_at(events.button_press())
                    .monitoring(false),
            )
            .unwrap();
        late.mark_recording();
        rig.wire(&mut track);

        // fire the end directly, skipping the start
        let err = late.end().fire().unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::Temporal(TemporalError::NotYetFired(id)) if id == late.start().id()
        ));
    }
}
