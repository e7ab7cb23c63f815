//! Virtual time for the discrete-event executor.
//!
//! Time is a fixed-point tick count with no dependency on `std::time`.
//! It advances only when the core executor dispatches a timed event,
//! never from wall-clock observation.

use std::cell::Cell;
use std::rc::Rc;

/// A logical instant in simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a `VirtualTime` from a raw tick value.
    #[inline]
    pub const fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// The instant `delay` ticks after `self`, or `None` on overflow.
    #[inline]
    pub fn plus(self, delay: u64) -> Option<VirtualTime> {
        self.0.checked_add(delay).map(VirtualTime)
    }

    /// Ticks elapsed between `earlier` and `self`.
    /// Returns `None` if `earlier` is after `self`.
    #[inline]
    pub fn since(self, earlier: VirtualTime) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        VirtualTime(ticks)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

// ── Time provider ─────────────────────────────────────────────────────

/// Read-only source of the current virtual time.
///
/// Components that only need to observe the clock (listeners, step
/// checks) should depend on this trait rather than on the executor.
pub trait TimeProvider {
    /// The current virtual time.
    fn time(&self) -> VirtualTime;
}

/// The executor's clock cell.
///
/// Clones share the same underlying instant. Only the executor moves it
/// forward (via the crate-private `advance_to`), so every clone handed out
/// is effectively read-only.
#[derive(Debug, Clone, Default)]
pub struct SharedClock {
    now: Rc<Cell<VirtualTime>>,
}

impl SharedClock {
    /// Create a clock reading `start`.
    pub fn starting_at(start: VirtualTime) -> Self {
        SharedClock {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move the clock to `to`. Never moves backward.
    pub(crate) fn advance_to(&self, to: VirtualTime) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl TimeProvider for SharedClock {
    #[inline]
    fn time(&self) -> VirtualTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_plus() {
        let t = VirtualTime::new(10_000);
        let later = t.plus(4321).unwrap();
        assert!(t < later);
        assert_eq!(later.ticks(), 14_321);
        assert_eq!(later.since(t), Some(4321));
        assert_eq!(t.since(later), None);
    }

    #[test]
    fn test_plus_overflow() {
        assert!(VirtualTime::new(u64::MAX).plus(1).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualTime::new(42).to_string(), "T=42");
    }

    #[test]
    fn test_clock_clones_share_time() {
        let clock = SharedClock::starting_at(VirtualTime::new(5));
        let view = clock.clone();
        clock.advance_to(VirtualTime::new(9));
        assert_eq!(view.time(), VirtualTime::new(9));
    }

    #[test]
    fn test_clock_never_moves_backward() {
        let clock = SharedClock::starting_at(VirtualTime::new(100));
        clock.advance_to(VirtualTime::new(50));
        assert_eq!(clock.time(), VirtualTime::new(100));
    }
}
