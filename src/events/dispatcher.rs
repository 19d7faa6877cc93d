// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event dispatcher.
//!
//! The dispatcher owns the pending button presses (FIFO in construction
//! order), the Boot event, and the timer queue of armed `Time` events. It
//! also owns the inbox through which trigger listeners talk to the dispatch
//! thread. Every action in the graph runs on the thread that calls into the
//! dispatcher; timers are fired from the dispatch loop, not from a timer
//! thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Event, EventKind, TimerQueue};
use crate::error::{Result, TriggerError};
use crate::timing::Clock;

/// Messages delivered to the dispatch thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMessage {
    /// An external trigger occurred
    Trigger,
    /// The trigger source will not produce more triggers
    SourceClosed,
    /// The trigger source failed
    SourceFailed(TriggerError),
}

/// State shared between the dispatcher, its handles and its events
pub(crate) struct Shared {
    clock: Arc<dyn Clock>,
    presses: Mutex<VecDeque<Event>>,
    boot: Mutex<Option<Event>>,
    timers: Mutex<TimerQueue>,
    outbox: Mutex<Sender<DispatchMessage>>,
    torn_down: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Queue `event` to fire `seconds` after `base` (or after now)
    pub(crate) fn schedule(&self, event: Event, base: Option<Instant>, seconds: f64) {
        if self.torn_down.load(Ordering::SeqCst) {
            warn!(event = %event, "timer armed after teardown; ignoring");
            return;
        }

        let seconds = if seconds.is_finite() && seconds >= 0.0 {
            seconds
        } else {
            warn!(event = %event, seconds, "invalid delay clamped to zero");
            0.0
        };

        let deadline = base.unwrap_or_else(|| self.now()) + Duration::from_secs_f64(seconds);
        debug!(event = %event, seconds, "timer armed");
        lock(&self.timers).schedule(event, deadline);
    }
}

/// Cloneable context used to create events bound to a dispatcher
#[derive(Clone)]
pub struct DispatchHandle {
    shared: Arc<Shared>,
}

impl DispatchHandle {
    /// The program's Boot event (the same event on every call)
    pub fn boot(&self) -> Event {
        let mut boot = lock(&self.shared.boot);
        boot.get_or_insert_with(|| Event::new(EventKind::Boot, Arc::downgrade(&self.shared)))
            .clone()
    }

    /// A new button press, queued behind every press created before it
    pub fn button_press(&self) -> Event {
        let press = Event::new(EventKind::ButtonPress, Arc::downgrade(&self.shared));
        if self.shared.torn_down.load(Ordering::SeqCst) {
            warn!(event = %press, "press created after teardown will never fire");
        } else {
            lock(&self.shared.presses).push_back(press.clone());
        }
        press
    }

    /// Number of presses still waiting to fire
    pub fn pending_presses(&self) -> usize {
        lock(&self.shared.presses).len()
    }
}

/// Serializes external triggers and due timers into the event graph
pub struct Dispatcher {
    shared: Arc<Shared>,
    inbox: Receiver<DispatchMessage>,
}

impl Dispatcher {
    /// Create a dispatcher reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            shared: Arc::new(Shared {
                clock,
                presses: Mutex::new(VecDeque::new()),
                boot: Mutex::new(None),
                timers: Mutex::new(TimerQueue::new()),
                outbox: Mutex::new(outbox),
                torn_down: AtomicBool::new(false),
            }),
            inbox,
        }
    }

    /// Handle for creating events
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Sender for posting messages to the dispatch thread
    pub fn sender(&self) -> Sender<DispatchMessage> {
        lock(&self.shared.outbox).clone()
    }

    /// Current time on the dispatcher's clock
    pub fn now(&self) -> Instant {
        self.shared.now()
    }

    /// Fire the Boot event, if the program uses one.
    ///
    /// Returns whether a Boot event was fired.
    pub fn boot(&self) -> Result<bool> {
        let boot = lock(&self.shared.boot).clone();
        match boot {
            Some(event) => {
                info!(event = %event, "boot");
                event.fire()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a button press is still waiting to fire
    pub fn is_expecting_press(&self) -> bool {
        self.pending_presses() > 0
    }

    /// Number of presses still waiting to fire
    pub fn pending_presses(&self) -> usize {
        lock(&self.shared.presses).len()
    }

    /// Pop the earliest-constructed pending press and fire it
    pub fn press_next(&self) -> Result<Option<Event>> {
        let next = lock(&self.shared.presses).pop_front();
        match next {
            Some(press) => {
                info!(event = %press, remaining = self.pending_presses(), "button press");
                press.fire()?;
                Ok(Some(press))
            }
            None => {
                debug!("trigger received with no press pending");
                Ok(None)
            }
        }
    }

    /// Fire every timer that is due, including timers armed by the
    /// firings themselves. Returns how many events fired.
    pub fn fire_due(&self) -> Result<usize> {
        let mut fired = 0;
        loop {
            let due = lock(&self.shared.timers).poll(self.now());
            if due.is_empty() {
                return Ok(fired);
            }
            for event in due {
                event.fire()?;
                fired += 1;
            }
        }
    }

    /// Number of armed timers
    pub fn pending_timers(&self) -> usize {
        lock(&self.shared.timers).len()
    }

    /// Time until the next armed timer is due
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        lock(&self.shared.timers).time_until_next(self.now())
    }

    /// Wait for the next inbox message, giving up after `timeout`.
    ///
    /// `None` means the timeout elapsed.
    pub fn recv(&self, timeout: Option<Duration>) -> Option<DispatchMessage> {
        match timeout {
            Some(timeout) => match self.inbox.recv_timeout(timeout) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(DispatchMessage::SourceClosed),
            },
            None => Some(
                self.inbox
                    .recv()
                    .unwrap_or(DispatchMessage::SourceClosed),
            ),
        }
    }

    /// Whether the dispatcher has been torn down
    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }

    /// Abandon pending presses and timers. Later timer arms are ignored.
    pub fn teardown(&self) {
        if self.shared.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let presses = std::mem::take(&mut *lock(&self.shared.presses));
        let mut timers = lock(&self.shared.timers);
        info!(
            abandoned_presses = presses.len(),
            abandoned_timers = timers.len(),
            "dispatcher torn down"
        );
        timers.clear();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::timing::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (Dispatcher, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Dispatcher::new(clock.clone()), clock)
    }

    #[test]
    fn test_boot_is_singleton() {
        let (dispatcher, _) = setup();
        let handle = dispatcher.handle();
        assert!(handle.boot().same_as(&handle.boot()));
    }

    #[test]
    fn test_boot_without_event() {
        let (dispatcher, _) = setup();
        assert!(!dispatcher.boot().unwrap());
    }

    #[test]
    fn test_boot_twice_fails() {
        let (dispatcher, _) = setup();
        dispatcher.handle().boot();
        assert!(dispatcher.boot().unwrap());
        assert!(matches!(
            dispatcher.boot(),
            Err(EngineError::DoubleFire { .. })
        ));
    }

    #[test]
    fn test_presses_fire_fifo() {
        let (dispatcher, _) = setup();
        let handle = dispatcher.handle();
        let p1 = handle.button_press();
        let p2 = handle.button_press();
        let p3 = handle.button_press();
        assert_eq!(dispatcher.pending_presses(), 3);

        assert_eq!(dispatcher.press_next().unwrap(), Some(p1.clone()));
        assert!(p1.has_fired() && !p2.has_fired() && !p3.has_fired());

        assert_eq!(dispatcher.press_next().unwrap(), Some(p2.clone()));
        assert_eq!(dispatcher.press_next().unwrap(), Some(p3.clone()));
        assert!(!dispatcher.is_expecting_press());
        assert_eq!(dispatcher.press_next().unwrap(), None);
    }

    #[test]
    fn test_fire_due_cascades_zero_delays() {
        let (dispatcher, _) = setup();
        let press = dispatcher.handle().button_press();
        let a = &press + 0.0;
        let b = &a + 0.0;

        dispatcher.press_next().unwrap();
        assert_eq!(dispatcher.fire_due().unwrap(), 2);
        assert!(a.has_fired() && b.has_fired());
    }

    #[test]
    fn test_negative_delay_clamped() {
        let (dispatcher, _) = setup();
        let press = dispatcher.handle().button_press();
        let early = &press + -4.0;

        dispatcher.press_next().unwrap();
        assert_eq!(dispatcher.time_until_next_timer(), Some(Duration::ZERO));
        dispatcher.fire_due().unwrap();
        assert_eq!(early.time().unwrap(), press.time().unwrap());
    }

    #[test]
    fn test_recv_timeout_and_messages() {
        let (dispatcher, _) = setup();
        assert_eq!(dispatcher.recv(Some(Duration::from_millis(1))), None);

        dispatcher.sender().send(DispatchMessage::Trigger).unwrap();
        assert_eq!(dispatcher.recv(None), Some(DispatchMessage::Trigger));
    }

    #[test]
    fn test_teardown_abandons_work() {
        let (dispatcher, clock) = setup();
        let handle = dispatcher.handle();
        let boot = handle.boot();
        let ran = Arc::new(AtomicUsize::new(0));
        let later = &boot + 1.0;
        let counter = ran.clone();
        later.add_action(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });
        handle.button_press();

        dispatcher.boot().unwrap();
        dispatcher.teardown();
        assert_eq!(dispatcher.pending_timers(), 0);
        assert_eq!(dispatcher.pending_presses(), 0);

        clock.advance_secs(2.0);
        assert_eq!(dispatcher.fire_due().unwrap(), 0);
        assert_eq!(ran.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arm_after_dispatcher_dropped() {
        let clock = Arc::new(ManualClock::new());
        let dispatcher = Dispatcher::new(clock);
        let handle = dispatcher.handle();
        let press = handle.button_press();
        let _later = &press + 1.0;
        drop(dispatcher);

        // The handle keeps state alive, but teardown has happened
        assert_eq!(handle.pending_presses(), 0);
        assert!(press.fire().is_ok());
    }

    #[test]
    fn test_fire_after_state_released() {
        let clock = Arc::new(ManualClock::new());
        let dispatcher = Dispatcher::new(clock);
        let press = dispatcher.handle().button_press();
        drop(dispatcher);

        assert!(matches!(press.fire(), Err(EngineError::TornDown)));
    }
}
