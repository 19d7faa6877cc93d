// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event graph for the looper engine.
//!
//! An [`Event`] is a point in time that is unknown until it happens. Events
//! carry an ordered list of actions which run, once, when the event fires.
//! There are three kinds:
//! - `Boot` fires when the program starts
//! - `ButtonPress` fires on an external trigger, in construction order
//! - `Time` fires a delay after another event (`event + seconds`)
//!
//! Building a `Time` never fires anything; it registers an arm action on its
//! trigger which, once the trigger fires, resolves the delay and hands the
//! firing to the dispatcher's timer queue.

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{DispatchHandle, DispatchMessage, Dispatcher};
pub use scheduler::{ScheduledFire, TimerQueue};

use std::fmt;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::error::{EngineError, Result, TemporalError};
use crate::snippet::duration::{DeferredDuration, Length};
use dispatcher::Shared;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    fn next() -> Self {
        EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Program start
    Boot,
    /// External trigger (button, footswitch, key)
    ButtonPress,
    /// Another event plus a delay
    Time,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Boot => "Boot",
            EventKind::ButtonPress => "ButtonPress",
            EventKind::Time => "Time",
        };
        f.write_str(name)
    }
}

/// A callback run when an event fires
pub type Action = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct EventState {
    fired_at: Option<Instant>,
    actions: Vec<Action>,
}

/// Where a `Time` event comes from
struct TimeOrigin {
    trigger: Weak<EventInner>,
    trigger_id: EventId,
    delay: Length,
}

struct EventInner {
    id: EventId,
    kind: EventKind,
    origin: Option<TimeOrigin>,
    dispatch: Weak<Shared>,
    state: Mutex<EventState>,
}

/// Shared handle to an event in the graph
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    pub(crate) fn new(kind: EventKind, dispatch: Weak<Shared>) -> Self {
        Self::build(kind, None, dispatch)
    }

    fn build(kind: EventKind, origin: Option<TimeOrigin>, dispatch: Weak<Shared>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id: EventId::next(),
                kind,
                origin,
                dispatch,
                state: Mutex::new(EventState {
                    fired_at: None,
                    actions: Vec::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EventState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Event identifier
    pub fn id(&self) -> EventId {
        self.inner.id
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        self.inner.kind
    }

    /// Delay after the trigger, for `Time` events
    pub fn delay(&self) -> Option<&Length> {
        self.inner.origin.as_ref().map(|o| &o.delay)
    }

    /// Identifier of the trigger, for `Time` events
    pub fn trigger_id(&self) -> Option<EventId> {
        self.inner.origin.as_ref().map(|o| o.trigger_id)
    }

    /// The trigger event, for `Time` events whose trigger is still alive
    pub fn trigger(&self) -> Option<Event> {
        self.inner
            .origin
            .as_ref()
            .and_then(|o| o.trigger.upgrade())
            .map(|inner| Event { inner })
    }

    /// Whether the event has fired
    pub fn has_fired(&self) -> bool {
        self.state().fired_at.is_some()
    }

    /// Firing timestamp, if fired
    pub fn fired_at(&self) -> Option<Instant> {
        self.state().fired_at
    }

    /// Firing timestamp; an error before the event has fired
    pub fn time(&self) -> std::result::Result<Instant, TemporalError> {
        self.fired_at().ok_or(TemporalError::NotYetFired(self.id()))
    }

    /// Number of actions waiting for the event to fire
    pub fn pending_actions(&self) -> usize {
        self.state().actions.len()
    }

    /// Append an action.
    ///
    /// Actions run in registration order. An action appended after the event
    /// has fired is kept but never runs.
    pub fn add_action<F>(&self, action: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let mut state = self.state();
        if state.fired_at.is_some() {
            warn!(event = %self, "action added after event fired; it will never run");
        }
        state.actions.push(Box::new(action));
    }

    /// Fire the event: record the timestamp, then run every action in order.
    ///
    /// Concurrent attempts are serialized by the state lock and only the
    /// first succeeds. If an action fails, the remaining actions are dropped
    /// and the error is returned.
    pub fn fire(&self) -> Result<()> {
        let shared = self.inner.dispatch.upgrade().ok_or(EngineError::TornDown)?;

        let actions = {
            let mut state = self.state();
            if state.fired_at.is_some() {
                return Err(EngineError::DoubleFire { event: self.id() });
            }
            state.fired_at = Some(shared.now());
            std::mem::take(&mut state.actions)
        };
        drop(shared);

        debug!(event = %self, actions = actions.len(), "firing");

        let total = actions.len();
        for (index, action) in actions.into_iter().enumerate() {
            if let Err(err) = action() {
                error!(
                    event = %self,
                    action = index,
                    skipped = total - index - 1,
                    "action failed: {}",
                    err
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// A new `Time` event firing `delay` after this one.
    ///
    /// Nothing fires now. When this event fires, the delay is resolved to
    /// seconds (a deferred duration is computed at that moment) and the new
    /// event is queued on the dispatcher.
    pub fn after(&self, delay: impl Into<Length>) -> Event {
        let delay = delay.into();
        let time = Event::build(
            EventKind::Time,
            Some(TimeOrigin {
                trigger: Arc::downgrade(&self.inner),
                trigger_id: self.id(),
                delay: delay.clone(),
            }),
            self.inner.dispatch.clone(),
        );

        let armed = time.clone();
        let trigger = Arc::downgrade(&self.inner);
        self.add_action(move || {
            let seconds = delay.seconds()?;
            let base = trigger
                .upgrade()
                .and_then(|inner| Event { inner }.fired_at());
            match armed.inner.dispatch.upgrade() {
                Some(shared) => {
                    shared.schedule(armed.clone(), base, seconds);
                    Ok(())
                }
                None => {
                    warn!(event = %armed, "dispatcher gone; timer abandoned");
                    Ok(())
                }
            }
        });

        time
    }

    /// Drop actions that never ran, releasing whatever they captured
    pub(crate) fn discard_actions(&self) -> usize {
        let mut state = self.state();
        let dropped = std::mem::take(&mut state.actions);
        dropped.len()
    }

    /// Whether two handles point at the same event
    pub fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Event {}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind(), self.id())
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Event")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("trigger", &self.trigger_id())
            .field("fired_at", &state.fired_at)
            .field("actions", &state.actions.len())
            .finish()
    }
}

impl Add<f64> for &Event {
    type Output = Event;

    fn add(self, seconds: f64) -> Event {
        self.after(seconds)
    }
}

impl Add<f64> for Event {
    type Output = Event;

    fn add(self, seconds: f64) -> Event {
        self.after(seconds)
    }
}

impl Add<&Event> for f64 {
    type Output = Event;

    fn add(self, event: &Event) -> Event {
        event.after(self)
    }
}

impl Add<Length> for &Event {
    type Output = Event;

    fn add(self, delay: Length) -> Event {
        self.after(delay)
    }
}

impl Add<Length> for Event {
    type Output = Event;

    fn add(self, delay: Length) -> Event {
        self.after(delay)
    }
}

impl Add<DeferredDuration> for &Event {
    type Output = Event;

    fn add(self, delay: DeferredDuration) -> Event {
        self.after(delay)
    }
}
