//! Time-ordered queue of pending session work.

use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::conditions::Condition;
use crate::notify::MessageHandle;

/// Deferred work a session performs when its time comes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Generate and announce a new order.
    SpawnOrder,
    /// Roll and apply a condition for a restaurant.
    ApplyCondition { restaurant: String },
    /// Lift a condition and retract its alert.
    ExpireCondition {
        condition: Condition,
        handle: Option<MessageHandle>,
    },
    /// Try again to announce an order whose first announcement failed.
    RetryAnnounce { order_id: String, attempt: u32 },
}

#[derive(Debug, Clone)]
struct Scheduled {
    due: DateTime<Utc>,
    seq: u64,
    event: SessionEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Min-heap of events by due time; equal times pop in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: DateTime<Utc>, event: SessionEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { due, seq, event }));
    }

    /// Earliest due time, if anything is pending.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    /// Remove and return the earliest event if it is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, SessionEvent)> {
        if self.next_due()? > now {
            return None;
        }
        self.queue
            .pop()
            .map(|Reverse(entry)| (entry.due, entry.event))
    }

    /// Number of pending events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(entry)| predicate(&entry.event))
            .count()
    }

    /// Pending events in no particular order.
    pub fn events(&self) -> impl Iterator<Item = &SessionEvent> {
        self.queue.iter().map(|Reverse(entry)| &entry.event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn pops_in_time_then_insertion_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let mut scheduler = Scheduler::new();
        scheduler.schedule(
            t0 + TimeDelta::seconds(10),
            SessionEvent::ApplyCondition {
                restaurant: "Pizzaria".into(),
            },
        );
        scheduler.schedule(t0 + TimeDelta::seconds(5), SessionEvent::SpawnOrder);
        scheduler.schedule(
            t0 + TimeDelta::seconds(5),
            SessionEvent::RetryAnnounce {
                order_id: "ab12".into(),
                attempt: 1,
            },
        );

        assert!(scheduler.pop_due(t0).is_none());
        let later = t0 + TimeDelta::seconds(30);
        let order: Vec<SessionEvent> =
            std::iter::from_fn(|| scheduler.pop_due(later).map(|(_, event)| event)).collect();
        assert_eq!(order[0], SessionEvent::SpawnOrder);
        assert!(matches!(order[1], SessionEvent::RetryAnnounce { .. }));
        assert!(matches!(order[2], SessionEvent::ApplyCondition { .. }));
        assert!(scheduler.is_empty());
    }
}
