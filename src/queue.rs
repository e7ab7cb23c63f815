//! Global event queues owned by the core executor.
//!
//! Events live in an arena keyed by [`EventId`]; the immediate FIFO and
//! the timed min-heap only hold ids and keys. Cancelled entries are not
//! removed eagerly: they stay in place and are discarded when popped, so
//! cancellation is `O(1)` and never disturbs the heap.

use std::collections::{BinaryHeap, HashMap, VecDeque};

use crate::event::{Event, EventId, EventIdGen, SourceType, TimedKey};
use crate::time::VirtualTime;

/// A queued event as seen by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent<S> {
    /// Event identity.
    pub id: EventId,
    /// Dispatch time, or `None` for immediate work.
    pub time: Option<VirtualTime>,
    /// Owning source.
    pub source: S,
    /// Label given at submission.
    pub description: String,
}

/// Where a popped event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Immediate,
    Timed(TimedKey),
}

/// Immediate FIFO plus timed min-heap over one event arena.
#[derive(Debug)]
pub(crate) struct EventQueues<S> {
    arena: HashMap<EventId, Event<S>>,
    immediate: VecDeque<EventId>,
    timed: BinaryHeap<TimedKey>,
    ids: EventIdGen,
}

impl<S: SourceType> EventQueues<S> {
    pub(crate) fn new() -> Self {
        EventQueues {
            arena: HashMap::new(),
            immediate: VecDeque::new(),
            timed: BinaryHeap::new(),
            ids: EventIdGen::default(),
        }
    }

    /// Mint the next id (and insertion sequence number).
    pub(crate) fn next_id(&mut self) -> EventId {
        self.ids.next_id()
    }

    /// Append to the immediate FIFO.
    pub(crate) fn push_immediate(&mut self, event: Event<S>) {
        self.immediate.push_back(event.id);
        self.arena.insert(event.id, event);
    }

    /// Insert into the timed heap under `key`.
    pub(crate) fn push_timed(&mut self, key: TimedKey, event: Event<S>) {
        debug_assert_eq!(key.id, event.id);
        self.timed.push(key);
        self.arena.insert(event.id, event);
    }

    /// Pop the next event: immediate work first, then the smallest timed key.
    pub(crate) fn pop_next(&mut self) -> Option<(Slot, Event<S>)> {
        while let Some(id) = self.immediate.pop_front() {
            if let Some(event) = self.arena.remove(&id) {
                return Some((Slot::Immediate, event));
            }
        }
        while let Some(key) = self.timed.pop() {
            if let Some(event) = self.arena.remove(&key.id) {
                return Some((Slot::Timed(key), event));
            }
        }
        None
    }

    /// Number of queued entries, including cancelled ones not yet popped.
    pub(crate) fn len(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Number of queued entries that will still execute.
    pub(crate) fn live_count(&self) -> usize {
        self.arena
            .values()
            .filter(|event| !event.cancelled.is_set())
            .count()
    }

    /// Live queued events in dispatch order.
    pub(crate) fn pending(&self) -> Vec<PendingEvent<S>> {
        let mut timed: Vec<TimedKey> = self.timed.iter().copied().collect();
        // Reversed `Ord`: sorting descending yields dispatch order.
        timed.sort_by(|a, b| b.cmp(a));

        let immediate = self.immediate.iter().map(|id| (None, *id));
        let timed = timed.into_iter().map(|key| (Some(key.time), key.id));

        immediate
            .chain(timed)
            .filter_map(|(time, id)| {
                let event = self.arena.get(&id)?;
                if event.cancelled.is_set() {
                    return None;
                }
                Some(PendingEvent {
                    id,
                    time,
                    source: event.source,
                    description: event.description.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancelable::CancelFlag;
    use crate::event::Invocation;

    fn event(queues: &mut EventQueues<&'static str>, label: &str) -> Event<&'static str> {
        Event {
            id: queues.next_id(),
            source: "src",
            description: label.to_string(),
            cancelled: CancelFlag::default(),
            invocation: Invocation::Direct,
            action: Box::new(|| Ok(())),
        }
    }

    fn push_at(queues: &mut EventQueues<&'static str>, time: u64, label: &str) -> EventId {
        let ev = event(queues, label);
        let id = ev.id;
        queues.push_timed(TimedKey::normal(VirtualTime::new(time), id), ev);
        id
    }

    fn drain_labels(queues: &mut EventQueues<&'static str>) -> Vec<String> {
        let mut labels = Vec::new();
        while let Some((_, ev)) = queues.pop_next() {
            labels.push(ev.description);
        }
        labels
    }

    #[test]
    fn test_fifo_at_same_time() {
        let mut queues = EventQueues::new();
        push_at(&mut queues, 10, "first");
        push_at(&mut queues, 10, "second");
        push_at(&mut queues, 10, "third");
        assert_eq!(drain_labels(&mut queues), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_time_ordering() {
        let mut queues = EventQueues::new();
        push_at(&mut queues, 30, "late");
        push_at(&mut queues, 10, "early");
        push_at(&mut queues, 20, "mid");
        assert_eq!(drain_labels(&mut queues), vec!["early", "mid", "late"]);
    }

    #[test]
    fn test_immediate_before_timed() {
        let mut queues = EventQueues::new();
        push_at(&mut queues, 0, "timed");
        let now = event(&mut queues, "now");
        queues.push_immediate(now);

        let (slot, first) = queues.pop_next().unwrap();
        assert_eq!(slot, Slot::Immediate);
        assert_eq!(first.description, "now");
        assert!(matches!(queues.pop_next(), Some((Slot::Timed(_), _))));
    }

    #[test]
    fn test_pending_skips_cancelled_and_follows_dispatch_order() {
        let mut queues = EventQueues::new();
        push_at(&mut queues, 50, "b");
        push_at(&mut queues, 20, "a");
        let dropped = event(&mut queues, "dropped");
        dropped.cancelled.set();
        queues.push_immediate(dropped);

        let pending = queues.pending();
        let labels: Vec<&str> = pending.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(pending[0].time, Some(VirtualTime::new(20)));
        assert_eq!(queues.len(), 3);
        assert_eq!(queues.live_count(), 2);
    }

    #[test]
    fn test_empty_queues() {
        let mut queues = EventQueues::<&'static str>::new();
        assert!(queues.is_empty());
        assert!(queues.pop_next().is_none());
    }
}
