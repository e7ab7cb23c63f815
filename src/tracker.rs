//! Record of which source is executing the current unit of work.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{SchedulerError, SchedulerResult};
use crate::event::SourceType;

/// Stack of executing source types, shared by every scheduler built on one
/// executor.
///
/// Listeners call [`active_source_type`](Self::active_source_type) to
/// attribute received work to its originating source. Only the crate
/// pushes and pops, through [`ActiveSourceGuard`].
#[derive(Debug)]
pub struct SourceTracker<S> {
    stack: Rc<RefCell<Vec<S>>>,
}

impl<S> Clone for SourceTracker<S> {
    fn clone(&self) -> Self {
        SourceTracker {
            stack: Rc::clone(&self.stack),
        }
    }
}

impl<S: SourceType> SourceTracker<S> {
    pub(crate) fn new() -> Self {
        SourceTracker {
            stack: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The innermost source currently executing.
    pub fn active_source_type(&self) -> SchedulerResult<S> {
        self.stack
            .borrow()
            .last()
            .copied()
            .ok_or(SchedulerError::NoActiveSource)
    }

    /// `true` while any unit of work is executing.
    pub fn is_active(&self) -> bool {
        !self.stack.borrow().is_empty()
    }

    /// Number of nested executions on the call stack.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Push `source` for the lifetime of the returned guard.
    pub(crate) fn enter(&self, source: S) -> ActiveSourceGuard<S> {
        self.stack.borrow_mut().push(source);
        ActiveSourceGuard {
            stack: Rc::clone(&self.stack),
        }
    }
}

/// Pops the tracker when dropped, including during unwinding.
pub(crate) struct ActiveSourceGuard<S> {
    stack: Rc<RefCell<Vec<S>>>,
}

impl<S> Drop for ActiveSourceGuard<S> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Src {
        A,
        B,
    }

    #[test]
    fn test_empty_tracker_reports_no_source() {
        let tracker = SourceTracker::<Src>::new();
        assert!(matches!(
            tracker.active_source_type(),
            Err(SchedulerError::NoActiveSource)
        ));
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_nested_guards_restore_outer_source() {
        let tracker = SourceTracker::new();
        let outer = tracker.enter(Src::A);
        assert_eq!(tracker.active_source_type().unwrap(), Src::A);
        {
            let _inner = tracker.enter(Src::B);
            assert_eq!(tracker.active_source_type().unwrap(), Src::B);
            assert_eq!(tracker.depth(), 2);
        }
        assert_eq!(tracker.active_source_type().unwrap(), Src::A);
        drop(outer);
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn test_guard_pops_on_panic() {
        let tracker = SourceTracker::new();
        let inner = tracker.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = inner.enter(Src::A);
            panic!("action blew up");
        }));
        assert!(result.is_err());
        assert!(!tracker.is_active());
    }
}
