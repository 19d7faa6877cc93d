// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for the looper engine
//!
//! These tests drive whole programs through the public API with a manual
//! clock, the simulated backend and scripted triggers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use looper::audio::{BackendOp, InputRef, SimulatedBackend};
use looper::config::EngineConfig;
use looper::control::{IndicatorSignal, MemoryIndicator, NullIndicator, ScriptedTrigger};
use looper::error::{ConstructionError, EngineError, TemporalError};
use looper::program::{Program, SessionState};
use looper::snippet::{DeferredDuration, SnippetSpec};
use looper::timing::ManualClock;

fn manual_program() -> (Program, Arc<ManualClock>, Arc<SimulatedBackend>) {
    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(SimulatedBackend::with_format(1_000, 2));
    let program =
        Program::with_clock(backend.clone(), clock.clone()).with_indicator(Arc::new(NullIndicator));
    (program, clock, backend)
}

#[test]
fn test_event_fires_once() {
    let (program, _, _) = manual_program();
    let press = program.events().button_press();

    assert!(matches!(
        press.time(),
        Err(TemporalError::NotYetFired(id)) if id == press.id()
    ));
    press.fire().unwrap();
    assert!(press.time().is_ok());
    assert!(matches!(press.fire(), Err(EngineError::DoubleFire { .. })));
}

#[test]
fn test_event_bounded_duration_is_exact() {
    let (mut program, clock, _) = manual_program();
    let events = program.events();
    let verse = program
        .add_track("guitar")
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot()).ending_at(events.button_press()),
        )
        .unwrap();
    assert!(!verse.duration().is_resolved());

    program.boot().unwrap();
    clock.advance(Duration::from_millis(3_217));
    program.trigger().unwrap();

    let expected = verse
        .end()
        .time()
        .unwrap()
        .duration_since(verse.start().time().unwrap())
        .as_secs_f64();
    assert_eq!(verse.duration().seconds().unwrap(), expected);
    assert!((expected - 3.217).abs() < 1e-9);
}

#[test]
fn test_deferred_duration_scales_after_end() {
    let (mut program, clock, _) = manual_program();
    let events = program.events();
    let verse = program
        .add_track("guitar")
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot()).ending_at(events.button_press()),
        )
        .unwrap();

    let half = DeferredDuration::new(verse.clone()) * 0.5;
    assert!(matches!(
        half.compute(),
        Err(TemporalError::DurationUnresolved(_))
    ));

    program.boot().unwrap();
    clock.advance_secs(3.0);
    program.trigger().unwrap();
    assert_eq!(half.compute().unwrap(), 1.5);
}

#[test]
fn test_construction_errors_before_any_fire() {
    let (mut program, _, _) = manual_program();
    let events = program.events();
    let boot = events.boot();
    let e1 = events.button_press();
    let track = program.add_track("errors");

    let both = track.add_snippet(
        SnippetSpec::live(InputRef::default(), boot.clone())
            .ending_at(e1.clone())
            .lasting(5.0),
    );
    assert!(matches!(
        both,
        Err(EngineError::Construction(ConstructionError::ConflictingLength))
    ));

    let neither = track.add_snippet(SnippetSpec::live(InputRef::default(), boot.clone()));
    assert!(matches!(
        neither,
        Err(EngineError::Construction(ConstructionError::MissingLength))
    ));

    assert!(!boot.has_fired());
    assert!(!e1.has_fired());
    // rejected snippets registered nothing
    assert_eq!(boot.pending_actions(), 0);
    assert!(track.is_empty());
}

#[test]
fn test_presses_fire_in_construction_order() {
    let (mut program, clock, _) = manual_program();
    let events = program.events();
    let p1 = events.button_press();
    let p2 = events.button_press();
    let p3 = events.button_press();

    // Wire them to snippets in a different order from their construction
    let track = program.add_track("order");
    track
        .add_snippet(SnippetSpec::live(InputRef::default(), p2.clone()).ending_at(p3.clone()))
        .unwrap();
    track
        .add_snippet(SnippetSpec::live(InputRef::default(), events.boot()).ending_at(p1.clone()))
        .unwrap();

    program.boot().unwrap();
    for expected in [&p1, &p2, &p3] {
        clock.advance_secs(1.0);
        program.trigger().unwrap();
        assert!(expected.has_fired());
    }
    assert!(p1.time().unwrap() < p2.time().unwrap());
    assert!(p2.time().unwrap() < p3.time().unwrap());
}

#[test]
fn test_end_to_end_loop() {
    let (mut program, clock, backend) = manual_program();
    let events = program.events();
    let track = program.add_track("looper");

    let riff = track
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot())
                .ending_at(events.button_press())
                .named("riff"),
        )
        .unwrap();
    let looped = track
        .add_snippet(SnippetSpec::clone_of(&riff, riff.end().clone()).repeat(-1))
        .unwrap();
    assert!(riff.is_recording());

    assert_eq!(program.boot().unwrap(), SessionState::Running);
    clock.advance_secs(2.75);
    assert_eq!(program.trigger().unwrap(), SessionState::Finished);

    let elapsed = riff
        .end()
        .time()
        .unwrap()
        .duration_since(riff.start().time().unwrap())
        .as_secs_f64();
    let take = riff.take().unwrap();
    assert_eq!(take.duration_seconds(), elapsed);
    assert!(looped.take().unwrap().shares_storage(&take));

    let playing = backend.active_playbacks();
    assert_eq!(playing.len(), 1);
    assert!(playing[0].is_looping());
}

#[test]
fn test_alias_happens_before_playback() {
    let (mut program, clock, backend) = manual_program();
    let events = program.events();

    // Clone lives on a later track than its source but starts on the same event
    let riff = program
        .add_track("source")
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot()).ending_at(events.button_press()),
        )
        .unwrap();
    program
        .add_track("clone")
        .add_snippet(SnippetSpec::clone_of(&riff, riff.end().clone()).repeat(-1))
        .unwrap();

    program.boot().unwrap();
    clock.advance_secs(1.0);
    program.trigger().unwrap();

    let ops = backend.ops();
    let finalized = ops
        .iter()
        .position(|op| matches!(op, BackendOp::FinalizeCapture { .. }))
        .unwrap();
    let started = ops
        .iter()
        .position(|op| matches!(op, BackendOp::StartPlayback { .. }))
        .unwrap();
    assert!(finalized < started);
    assert!(matches!(
        ops[started],
        BackendOp::StartPlayback { looping: true, frames: 1_000, .. }
    ));
}

#[test]
fn test_indicator_signals_follow_recording() {
    let clock = Arc::new(ManualClock::new());
    let backend = Arc::new(SimulatedBackend::new());
    let indicator = Arc::new(MemoryIndicator::new());
    let mut program =
        Program::with_clock(backend, clock.clone()).with_indicator(indicator.clone());
    let events = program.events();
    let track = program.add_track("vox");
    let take = track
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot())
                .ending_at(events.button_press())
                .monitoring(false)
                .named("take"),
        )
        .unwrap();
    track
        .add_snippet(SnippetSpec::clone_of(&take, take.end().clone()).monitoring(false))
        .unwrap();

    program.boot().unwrap();
    assert!(indicator.is_recording());
    clock.advance_secs(1.0);
    program.trigger().unwrap();

    assert!(!indicator.is_recording());
    assert_eq!(
        indicator.signals(),
        vec![
            IndicatorSignal::RecordingStarted("take".into()),
            IndicatorSignal::RecordingStopped("take".into(), 1.0),
        ]
    );
}

#[test]
fn test_failing_action_ends_session() {
    let backend = Arc::new(SimulatedBackend::new());
    let mut program = Program::new(backend.clone()).with_indicator(Arc::new(NullIndicator));
    let events = program.events();
    let press = events.button_press();
    let later = events.button_press();
    press.add_action(|| Err(EngineError::TornDown));

    let result = program.run(ScriptedTrigger::new(5));
    assert!(matches!(result, Err(EngineError::TornDown)));
    assert!(!later.has_fired());
    assert!(!backend.is_booted());
}

#[test]
fn test_threaded_run_records_real_time() {
    let backend = Arc::new(SimulatedBackend::with_format(10_000, 1));
    let mut program = Program::new(backend.clone()).with_indicator(Arc::new(NullIndicator));
    let events = program.events();
    let track = program.add_track("live");
    let riff = track
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot()).ending_at(events.button_press()),
        )
        .unwrap();
    let echo = track
        .add_snippet(
            SnippetSpec::clone_of(&riff, riff.end().clone())
                .lasting(0.02)
                .monitoring(false),
        )
        .unwrap();

    let fired = Arc::new(Mutex::new(false));
    let flag = fired.clone();
    echo.end().add_action(move || {
        *flag.lock().unwrap() = true;
        Ok(())
    });

    // the final trigger comes well after the echo's timer is due
    let result = program.run(ScriptedTrigger::new(2).with_interval(Duration::from_millis(60)));
    result.unwrap();

    let take = riff.take().unwrap();
    let elapsed = riff
        .end()
        .time()
        .unwrap()
        .duration_since(riff.start().time().unwrap())
        .as_secs_f64();
    assert!((take.duration_seconds() - elapsed).abs() < 1e-3);
    assert!(elapsed >= 0.03);
    assert!(*fired.lock().unwrap());
}

#[test]
fn test_program_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    std::fs::write(
        &path,
        "audio:\n  sample_rate: 8000\n  initial_capture_seconds: 5\ntrigger:\n  source: console\n",
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let backend = Arc::new(SimulatedBackend::with_format(
        config.audio.sample_rate,
        config.audio.channels,
    ));
    let mut program = Program::from_config(&config, backend.clone());
    let events = program.events();
    let riff = program
        .add_track("cfg")
        .add_snippet(
            SnippetSpec::live(InputRef::default(), events.boot())
                .ending_at(events.button_press())
                .monitoring(false),
        )
        .unwrap();
    program
        .add_track("cfg clone")
        .add_snippet(SnippetSpec::clone_of(&riff, riff.end().clone()))
        .unwrap();

    program.boot().unwrap();
    assert!(backend.ops().iter().any(|op| matches!(
        op,
        BackendOp::BeginCapture { buffer, .. }
            if *buffer == looper::audio::CaptureBuffer::growable(5.0)
    )));
}
