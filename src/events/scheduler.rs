// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timer queue for armed `Time` events.
//!
//! A priority queue keyed on deadline. Firings with equal deadlines come out
//! in the order they were armed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::Event;

/// A `Time` event waiting for its deadline
#[derive(Debug, Clone)]
pub struct ScheduledFire {
    /// When the event should fire
    pub deadline: Instant,
    /// Arm order, breaks ties between equal deadlines
    seq: u64,
    /// The event to fire
    pub event: Event,
}

// For BinaryHeap - we want the earliest deadline first
impl Eq for ScheduledFire {}

impl PartialEq for ScheduledFire {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for ScheduledFire {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledFire {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending timer firings
#[derive(Debug, Default)]
pub struct TimerQueue {
    queue: BinaryHeap<ScheduledFire>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with room for `capacity` timers
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Arm `event` to fire at `deadline`
    pub fn schedule(&mut self, event: Event, deadline: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledFire {
            deadline,
            seq,
            event,
        });
    }

    /// Remove and return every event due at or before `now`, earliest first
    pub fn poll(&mut self, now: Instant) -> Vec<Event> {
        let mut due = Vec::new();

        while let Some(next) = self.queue.peek() {
            if next.deadline > now {
                break;
            }
            if let Some(fire) = self.queue.pop() {
                due.push(fire.event);
            }
        }

        due
    }

    /// Deadline of the next timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|fire| fire.deadline)
    }

    /// Time until the next timer is due (zero if overdue)
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no timers are armed
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Abandon every armed timer
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
