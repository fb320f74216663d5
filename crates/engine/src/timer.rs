use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle for a scheduled timer.
    pub struct TimerId;
}

struct Timer<T> {
    deadline: DateTime<Utc>,
    payload: T,
}

/// Deadline-ordered timers that can be cancelled.
///
/// A timer fires at most once: `pop_due` removes what it returns, and
/// cancelling a fired or already-cancelled timer does nothing.
pub struct TimerQueue<T> {
    timers: SlotMap<TimerId, Timer<T>>,
    order: BTreeSet<(DateTime<Utc>, TimerId)>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            timers: SlotMap::with_key(),
            order: BTreeSet::new(),
        }
    }

    pub fn schedule(&mut self, deadline: DateTime<Utc>, payload: T) -> TimerId {
        let id = self.timers.insert(Timer { deadline, payload });
        self.order.insert((deadline, id));
        id
    }

    /// Returns the payload if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let timer = self.timers.remove(id)?;
        self.order.remove(&(timer.deadline, id));
        Some(timer.payload)
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(&(deadline, id)) = self.order.first() {
            if deadline > now {
                break;
            }
            self.order.pop_first();
            if let Some(timer) = self.timers.remove(id) {
                due.push(timer.payload);
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.order.first().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
