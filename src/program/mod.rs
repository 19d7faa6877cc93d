// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Programs: tracks of snippets plus the dispatch loop that performs them.
//!
//! A session goes through three steps:
//! 1. build: add tracks and snippets against [`Program::events`]
//! 2. boot: start the backend, wire every snippet, fire Boot
//! 3. perform: each external trigger fires the next pending button press
//!
//! [`Program::run`] does steps 2 and 3 with a trigger source on a listener
//! thread. The step methods (`boot`, `trigger`, `fire_due_timers`) drive the
//! same state machine directly, which is how tests use it.

pub mod track;

pub use track::Track;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::AudioBackend;
use crate::config::EngineConfig;
use crate::control::{Indicator, LogIndicator, TriggerSource};
use crate::error::{EngineError, Result, TriggerError};
use crate::events::{DispatchHandle, DispatchMessage, Dispatcher};
use crate::snippet::{Snippet, WiringContext};
use crate::timing::{Clock, SystemClock};

/// How long the listener waits on a source before checking for shutdown
const LISTEN_POLL: Duration = Duration::from_millis(50);

/// How long `run` waits for the listener to wind down
const LISTENER_GRACE: Duration = Duration::from_millis(500);

/// Whether the performance still expects button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Presses remain
    Running,
    /// Every press has fired; the next trigger ends the session
    Finished,
}

/// An ordered set of tracks and the machinery to perform them
pub struct Program {
    tracks: Vec<Track>,
    dispatcher: Dispatcher,
    backend: Arc<dyn AudioBackend>,
    indicator: Arc<dyn Indicator>,
    initial_capture_seconds: f64,
    instantiated: bool,
    torn_down: bool,
}

impl Program {
    /// Program on the system clock, logging indicator signals
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// Program reading time from `clock`
    pub fn with_clock(backend: Arc<dyn AudioBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tracks: Vec::new(),
            dispatcher: Dispatcher::new(clock),
            backend,
            indicator: Arc::new(LogIndicator),
            initial_capture_seconds: 60.0,
            instantiated: false,
            torn_down: false,
        }
    }

    /// Program configured from `config`
    pub fn from_config(config: &EngineConfig, backend: Arc<dyn AudioBackend>) -> Self {
        Self::new(backend).with_initial_capture_seconds(config.audio.initial_capture_seconds)
    }

    /// Replace the indicator
    pub fn with_indicator(mut self, indicator: Arc<dyn Indicator>) -> Self {
        self.indicator = indicator;
        self
    }

    /// Starting size of growable capture buffers
    pub fn with_initial_capture_seconds(mut self, seconds: f64) -> Self {
        self.initial_capture_seconds = seconds;
        self
    }

    /// Context for creating events bound to this program
    pub fn events(&self) -> DispatchHandle {
        self.dispatcher.handle()
    }

    /// Append a track and return it for building
    pub fn add_track(&mut self, name: impl Into<String>) -> &mut Track {
        self.tracks.push(Track::new(name));
        let index = self.tracks.len() - 1;
        &mut self.tracks[index]
    }

    /// Tracks in insertion order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Mutable access to a track
    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Iterate over every snippet of every track
    pub fn snippets(&self) -> impl Iterator<Item = &Snippet> {
        self.tracks.iter().flat_map(|track| track.iter())
    }

    /// The dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether snippets have been wired
    pub fn is_instantiated(&self) -> bool {
        self.instantiated
    }

    /// Wire every snippet onto its events, in creation order.
    ///
    /// Must run before Boot fires; `boot` calls it.
    pub fn instantiate(&mut self) -> Result<()> {
        if self.instantiated {
            return Err(EngineError::AlreadyInstantiated);
        }
        let ctx = WiringContext {
            backend: Arc::clone(&self.backend),
            indicator: Arc::clone(&self.indicator),
            initial_capture_seconds: self.initial_capture_seconds,
        };

        let mut snippets: Vec<&mut Snippet> = self
            .tracks
            .iter_mut()
            .flat_map(|track| track.snippets_mut())
            .collect();
        snippets.sort_by_key(|snippet| snippet.id());

        for snippet in snippets {
            snippet.wire(&ctx)?;
        }
        self.instantiated = true;
        debug!(
            tracks = self.tracks.len(),
            snippets = self.snippets().count(),
            "program instantiated"
        );
        Ok(())
    }

    /// Start the backend, wire every snippet and fire Boot
    pub fn boot(&mut self) -> Result<SessionState> {
        self.backend.boot()?;
        self.instantiate()?;
        self.dispatcher.boot()?;
        self.dispatcher.fire_due()?;
        info!(
            presses = self.dispatcher.pending_presses(),
            "program booted"
        );
        Ok(self.state())
    }

    /// Handle one external trigger: fire the next pending press
    pub fn trigger(&mut self) -> Result<SessionState> {
        self.dispatcher.fire_due()?;
        self.dispatcher.press_next()?;
        self.dispatcher.fire_due()?;
        Ok(self.state())
    }

    /// Fire every timer that is due now
    pub fn fire_due_timers(&self) -> Result<usize> {
        self.dispatcher.fire_due()
    }

    /// Time until the next armed timer
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        self.dispatcher.time_until_next_timer()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        if self.dispatcher.is_expecting_press() {
            SessionState::Running
        } else {
            SessionState::Finished
        }
    }

    /// Stop dispatching and release the backend. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.dispatcher.teardown();
        let released: usize = self
            .tracks
            .iter()
            .flat_map(|track| track.iter())
            .map(|snippet| snippet.release())
            .sum();
        self.backend.shutdown();
        info!(released_actions = released, "program torn down");
    }

    /// Perform the program with triggers from `source`.
    ///
    /// Boots, then fires one button press per trigger while timers fire on
    /// schedule. Once every press has fired, one more trigger ends the
    /// session. A source that closes early also ends it. The listener is
    /// stopped and the source dropped, then everything is torn down before
    /// returning, on success or error.
    pub fn run<T>(&mut self, source: T) -> Result<()>
    where
        T: TriggerSource + 'static,
    {
        let outbox = self.dispatcher.sender();
        let stop = Arc::new(AtomicBool::new(false));
        let description = source.describe();
        let listener = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("trigger-listener".into())
                .spawn(move || listen(source, outbox, stop))
                .map_err(|e| TriggerError::Device(e.to_string()))?
        };
        info!(source = %description, "waiting for triggers");

        let result = self.perform();
        stop.store(true, Ordering::SeqCst);
        stop_listener(listener);
        self.teardown();
        result
    }

    fn perform(&mut self) -> Result<()> {
        let mut state = self.boot()?;
        if state == SessionState::Finished {
            info!("no button presses pending; trigger once more to finish");
        }

        loop {
            let timeout = self.dispatcher.time_until_next_timer();
            match self.dispatcher.recv(timeout) {
                None => {
                    self.dispatcher.fire_due()?;
                }
                Some(DispatchMessage::Trigger) => {
                    if state == SessionState::Finished {
                        info!("session complete");
                        return Ok(());
                    }
                    state = self.trigger()?;
                    if state == SessionState::Finished {
                        info!("all presses fired; trigger once more to finish");
                    }
                }
                Some(DispatchMessage::SourceClosed) => {
                    warn!(
                        pending = self.dispatcher.pending_presses(),
                        "trigger source closed; ending session"
                    );
                    return Ok(());
                }
                Some(DispatchMessage::SourceFailed(err)) => return Err(err.into()),
            }
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

/// Forward triggers to the dispatch thread until the source closes, the
/// dispatcher goes away or `stop` is raised. The source is dropped here, on
/// the listener thread, which restores whatever it took over (raw mode).
fn listen<T: TriggerSource>(mut source: T, outbox: Sender<DispatchMessage>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        let message = match source.poll_trigger(LISTEN_POLL) {
            Ok(false) => continue,
            Ok(true) => DispatchMessage::Trigger,
            Err(TriggerError::Closed) => DispatchMessage::SourceClosed,
            Err(err) => DispatchMessage::SourceFailed(err),
        };
        let last = message != DispatchMessage::Trigger;
        if outbox.send(message).is_err() || last {
            break;
        }
    }
    drop(source);
    debug!("trigger listener stopped");
}

/// Wait for the listener to finish. A source stuck in a blocking read
/// (stdin) is left behind after `LISTENER_GRACE`.
fn stop_listener(listener: JoinHandle<()>) {
    let deadline = Instant::now() + LISTENER_GRACE;
    while !listener.is_finished() {
        if Instant::now() >= deadline {
            debug!("trigger listener still blocked; detaching");
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    if listener.join().is_err() {
        warn!("trigger listener panicked");
    }
}
