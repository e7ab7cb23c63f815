//! Cancellation handles for scheduled work.

use std::cell::Cell;
use std::rc::Rc;

use crate::event::EventId;

/// Shared cancelled flag between an event record and its handles.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelFlag(Rc<Cell<bool>>);

impl CancelFlag {
    pub(crate) fn set(&self) {
        self.0.set(true);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.get()
    }
}

/// Revocation handle returned for every scheduled unit of work.
///
/// The handle only knows the event's id and its cancelled flag; it can
/// neither reach the action nor move the event in time. Cancelling is
/// idempotent and harmless once the event has run. The executor checks
/// the flag immediately before invoking an action, so cancelling from a
/// concurrently dispatched action still takes effect.
#[derive(Debug, Clone)]
pub struct Cancelable {
    id: EventId,
    flag: CancelFlag,
}

impl Cancelable {
    pub(crate) fn new(id: EventId, flag: CancelFlag) -> Self {
        Cancelable { id, flag }
    }

    /// Mark the referenced event as cancelled.
    pub fn cancel(&self) {
        self.flag.set();
    }

    /// Whether `cancel` has been called on this or a cloned handle.
    pub fn is_cancelled(&self) -> bool {
        self.flag.is_set()
    }

    /// Id of the referenced event.
    pub fn id(&self) -> EventId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let handle = Cancelable::new(EventId::new(1), CancelFlag::default());
        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let flag = CancelFlag::default();
        let handle = Cancelable::new(EventId::new(3), flag.clone());
        handle.clone().cancel();
        assert!(flag.is_set());
        assert_eq!(handle.id(), EventId::new(3));
    }
}
