//! Event records for the core executor.
//!
//! Every unit of work submitted to the executor becomes an [`Event`]. The
//! executor owns the record; callers only ever hold a
//! [`Cancelable`](crate::Cancelable) pointing back at it by id.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use crate::cancelable::CancelFlag;
use crate::time::VirtualTime;

// ── Source type ───────────────────────────────────────────────────────

/// Identity of a logical source sharing one executor.
///
/// Implemented for every small copyable value; in practice a fieldless
/// enum listing the simulated threads:
///
/// ```rust
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Thread { Planner, Controller }
///
/// fn takes_source<S: eventide::SourceType>(_: S) {}
/// takes_source(Thread::Planner);
/// ```
pub trait SourceType: Copy + Eq + Hash + Debug + 'static {}

impl<T> SourceType for T where T: Copy + Eq + Hash + Debug + 'static {}

// ── Event ID ──────────────────────────────────────────────────────────

/// Stable identity of a submitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw value.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Strictly increasing id generator.
///
/// Ids are minted at submission time, so an id doubles as the event's
/// insertion sequence number.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    pub(crate) fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

// ── Action ────────────────────────────────────────────────────────────

/// A scheduled unit of work. Invoked at most once.
///
/// Returning an error aborts the current run; see
/// [`SchedulerError::ActionFailed`](crate::SchedulerError::ActionFailed).
pub type Action = Box<dyn FnOnce() -> anyhow::Result<()>>;

// ── Event ─────────────────────────────────────────────────────────────

/// How the executor runs an event's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// A user action. The executor attributes, traces and counts it.
    Direct,
    /// Scheduler plumbing that decides itself whether a user action runs,
    /// and invokes it through the executor if so.
    Routed,
}

/// A queued unit of work owned by the executor.
pub(crate) struct Event<S> {
    pub(crate) id: EventId,
    pub(crate) source: S,
    pub(crate) description: String,
    pub(crate) cancelled: CancelFlag,
    pub(crate) invocation: Invocation,
    pub(crate) action: Action,
}

impl<S: Debug> Debug for Event<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("description", &self.description)
            .field("cancelled", &self.cancelled.is_set())
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

// ── Timed ordering ────────────────────────────────────────────────────

/// Ordering class for timed entries sharing the same instant.
///
/// Work replayed out of a source pause sorts ahead of everything that was
/// scheduled for the release instant independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Lane {
    Released,
    Normal,
}

/// Key of a timed-queue entry.
///
/// Entries pop in ascending `(time, lane, origin, id)` order. `origin` is
/// the instant the event was first scheduled for; it only differs from
/// `time` for work replayed out of a pause. Because ids are handed out in
/// submission order, `id` is the insertion-sequence tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimedKey {
    pub(crate) time: VirtualTime,
    pub(crate) lane: Lane,
    pub(crate) origin: VirtualTime,
    pub(crate) id: EventId,
}

impl TimedKey {
    pub(crate) fn normal(time: VirtualTime, id: EventId) -> Self {
        TimedKey {
            time,
            lane: Lane::Normal,
            origin: time,
            id,
        }
    }

    pub(crate) fn released(time: VirtualTime, origin: VirtualTime, id: EventId) -> Self {
        TimedKey {
            time,
            lane: Lane::Released,
            origin,
            id,
        }
    }

    fn rank(&self) -> (VirtualTime, Lane, VirtualTime, EventId) {
        (self.time, self.lane, self.origin, self.id)
    }
}

/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here
/// to pop the smallest key first.
impl Ord for TimedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank().cmp(&self.rank())
    }
}

impl PartialOrd for TimedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(time: u64, id: u64) -> TimedKey {
        TimedKey::normal(VirtualTime::new(time), EventId::new(id))
    }

    fn released(time: u64, origin: u64, id: u64) -> TimedKey {
        TimedKey::released(VirtualTime::new(time), VirtualTime::new(origin), EventId::new(id))
    }

    #[test]
    fn test_event_ids_are_monotonic() {
        let mut ids = EventIdGen::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert!(a < b);
    }

    #[test]
    fn test_earlier_time_pops_first() {
        // Reversed ordering: the earlier key compares greater.
        assert!(normal(10, 5) > normal(20, 1));
    }

    #[test]
    fn test_id_breaks_ties() {
        assert!(normal(10, 1) > normal(10, 2));
    }

    #[test]
    fn test_released_lane_beats_earlier_submission() {
        assert!(released(10, 4, 9) > normal(10, 0));
        assert!(normal(9, 9) > released(10, 4, 0));
    }

    #[test]
    fn test_released_entries_keep_original_time_order() {
        // Submitted later but originally due earlier.
        assert!(released(50, 12, 8) > released(50, 14, 3));
    }

    #[test]
    fn test_event_id_display() {
        assert_eq!(EventId::new(42).to_string(), "E#42");
    }
}
