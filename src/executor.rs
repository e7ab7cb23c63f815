//! Core executor: one virtual clock, one immediate queue, one timed queue.
//!
//! The executor is source-agnostic. It tags every event with a source
//! type only so the [`SourceTracker`] can report who is running; per-source
//! pausing lives entirely in [`SourceScheduler`](crate::SourceScheduler).
//!
//! Dispatch loop, repeated until both queues are empty:
//!
//! 1. Immediate work first, FIFO, including work appended while draining.
//! 2. Otherwise the smallest timed entry; the clock advances to its time.
//!
//! Only user actions are attributed, traced and counted. Events queued by
//! a [`SourceScheduler`](crate::SourceScheduler) are routed: they decide at
//! dispatch whether their action runs now or stays parked, and go through
//! the same invocation path when it does.
//!
//! No `RefCell` borrow is held while an action runs, so actions may call
//! back into any method here.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::cancelable::{CancelFlag, Cancelable};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::event::{Action, Event, EventId, Invocation, SourceType, TimedKey};
use crate::queue::{EventQueues, PendingEvent, Slot};
use crate::time::{SharedClock, TimeProvider, VirtualTime};
use crate::trace::{DispatchTrace, TraceEntry};
use crate::tracker::SourceTracker;

struct ExecutorState<S> {
    queues: EventQueues<S>,
    sources: HashSet<S>,
    paused: bool,
    halted: bool,
    running: bool,
    events_processed: u64,
    trace: Option<DispatchTrace<S>>,
}

struct ExecutorInner<S> {
    state: RefCell<ExecutorState<S>>,
    clock: SharedClock,
    tracker: SourceTracker<S>,
}

/// The backing discrete-event scheduler shared by every source.
///
/// Cloning yields another handle to the same executor.
pub struct Executor<S> {
    inner: Rc<ExecutorInner<S>>,
}

impl<S> Clone for Executor<S> {
    fn clone(&self) -> Self {
        Executor {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Handle for closures the scheduler itself queues on the executor, so a
/// queued event never keeps its own executor alive.
pub(crate) struct WeakExecutor<S> {
    inner: Weak<ExecutorInner<S>>,
}

impl<S> Clone for WeakExecutor<S> {
    fn clone(&self) -> Self {
        WeakExecutor {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S> WeakExecutor<S> {
    pub(crate) fn upgrade(&self) -> Option<Executor<S>> {
        self.inner.upgrade().map(|inner| Executor { inner })
    }
}

impl<S: SourceType> std::fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Executor")
            .field("now", &self.inner.clock.time())
            .field("queued", &state.queues.len())
            .field("paused", &state.paused)
            .field("halted", &state.halted)
            .finish()
    }
}

impl<S: SourceType> Executor<S> {
    /// Create an executor from `config`.
    pub fn new(config: &SchedulerConfig<S>) -> Self {
        let state = ExecutorState {
            queues: EventQueues::new(),
            sources: config.source_types.iter().copied().collect(),
            paused: config.start_paused,
            halted: false,
            running: false,
            events_processed: 0,
            trace: None,
        };
        Executor {
            inner: Rc::new(ExecutorInner {
                state: RefCell::new(state),
                clock: SharedClock::starting_at(config.initial_time),
                tracker: SourceTracker::new(),
            }),
        }
    }

    // ── Clock & tracker ───────────────────────────────────────

    /// Current virtual time.
    pub fn current_time(&self) -> VirtualTime {
        self.inner.clock.time()
    }

    /// A read-only view of the clock.
    pub fn clock(&self) -> SharedClock {
        self.inner.clock.clone()
    }

    /// The tracker updated around every action this executor invokes.
    pub fn tracker(&self) -> SourceTracker<S> {
        self.inner.tracker.clone()
    }

    /// Whether `source` was part of the configuration.
    pub fn knows_source(&self, source: S) -> bool {
        self.inner.state.borrow().sources.contains(&source)
    }

    pub(crate) fn downgrade(&self) -> WeakExecutor<S> {
        WeakExecutor {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Submission ────────────────────────────────────────────

    /// Schedule `action` to run at `time` on behalf of `source`.
    ///
    /// Fails with [`SchedulerError::InvalidSchedule`] if `time` is before
    /// the current time.
    pub fn schedule_at<F>(
        &self,
        time: VirtualTime,
        source: S,
        description: impl Into<String>,
        action: F,
    ) -> SchedulerResult<Cancelable>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.check_time(time)?;
        self.check_source(source)?;
        let id = self.reserve_id();
        let flag = CancelFlag::default();
        self.enqueue_timed(
            TimedKey::normal(time, id),
            Event {
                id,
                source,
                description: description.into(),
                cancelled: flag.clone(),
                invocation: Invocation::Direct,
                action: Box::new(action),
            },
        );
        Ok(Cancelable::new(id, flag))
    }

    /// Queue `action` to run as soon as possible on behalf of `source`.
    pub fn schedule_now<F>(
        &self,
        source: S,
        description: impl Into<String>,
        action: F,
    ) -> SchedulerResult<Cancelable>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.check_source(source)?;
        let id = self.reserve_id();
        let flag = CancelFlag::default();
        self.enqueue_now(Event {
            id,
            source,
            description: description.into(),
            cancelled: flag.clone(),
            invocation: Invocation::Direct,
            action: Box::new(action),
        });
        Ok(Cancelable::new(id, flag))
    }

    pub(crate) fn check_time(&self, time: VirtualTime) -> SchedulerResult<()> {
        let current = self.current_time();
        if time < current {
            return Err(SchedulerError::InvalidSchedule {
                requested: time,
                current,
            });
        }
        Ok(())
    }

    fn check_source(&self, source: S) -> SchedulerResult<()> {
        if self.knows_source(source) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownSource {
                source_type: format!("{:?}", source),
            })
        }
    }

    pub(crate) fn reserve_id(&self) -> EventId {
        self.inner.state.borrow_mut().queues.next_id()
    }

    /// Queue a routed immediate event.
    pub(crate) fn submit_now(
        &self,
        id: EventId,
        source: S,
        description: String,
        cancelled: CancelFlag,
        action: Action,
    ) {
        self.enqueue_now(Event {
            id,
            source,
            description,
            cancelled,
            invocation: Invocation::Routed,
            action,
        });
    }

    /// Queue a routed timed event under `key`.
    pub(crate) fn submit_timed(
        &self,
        key: TimedKey,
        source: S,
        description: String,
        cancelled: CancelFlag,
        action: Action,
    ) {
        self.enqueue_timed(
            key,
            Event {
                id: key.id,
                source,
                description,
                cancelled,
                invocation: Invocation::Routed,
                action,
            },
        );
    }

    fn enqueue_now(&self, event: Event<S>) {
        debug!(event = %event.id, source = ?event.source, description = %event.description, "queued immediate event");
        self.inner.state.borrow_mut().queues.push_immediate(event);
    }

    fn enqueue_timed(&self, key: TimedKey, event: Event<S>) {
        debug!(event = %key.id, time = %key.time, source = ?event.source, description = %event.description, "queued timed event");
        self.inner.state.borrow_mut().queues.push_timed(key, event);
    }

    // ── Run control ───────────────────────────────────────────

    /// Suspend dispatch. Submissions keep queueing.
    ///
    /// Called from inside an action, the loop stops once that action
    /// returns.
    pub fn pause(&self) {
        self.inner.state.borrow_mut().paused = true;
        info!(now = %self.current_time(), "executor paused");
    }

    /// Lift a pause and run until the queues drain.
    pub fn resume(&self) -> SchedulerResult<u64> {
        self.inner.state.borrow_mut().paused = false;
        info!(now = %self.current_time(), "executor resumed");
        self.run()
    }

    /// Stop dispatching for good. Queued events stay queued.
    pub fn halt(&self) {
        self.inner.state.borrow_mut().halted = true;
        info!(now = %self.current_time(), "executor halted");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.borrow().paused
    }

    pub fn is_halted(&self) -> bool {
        self.inner.state.borrow().halted
    }

    /// `true` while the dispatch loop is on the call stack.
    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    /// Dispatch until both queues are empty, the executor is paused, or
    /// it is halted. Returns the number of user actions invoked.
    ///
    /// Does nothing while paused, and is a no-op when called from inside
    /// an action: the outer loop keeps draining.
    pub fn run(&self) -> SchedulerResult<u64> {
        self.drive(None)
    }

    /// Like [`run`](Self::run), but stops once `max_steps` user actions
    /// have been invoked. A release replaying a backlog counts each action
    /// it runs, so the total can overshoot on that step.
    pub fn run_for(&self, max_steps: u64) -> SchedulerResult<u64> {
        self.drive(Some(max_steps))
    }

    fn drive(&self, limit: Option<u64>) -> SchedulerResult<u64> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.halted {
                return Err(SchedulerError::Halted);
            }
            if state.running || state.paused {
                return Ok(0);
            }
            state.running = true;
        }
        let _running = RunningGuard { inner: &self.inner };

        let mut executed = 0u64;
        loop {
            if limit.is_some_and(|max| executed >= max) {
                break;
            }
            let next = {
                let mut state = self.inner.state.borrow_mut();
                if state.paused || state.halted {
                    break;
                }
                state.queues.pop_next()
            };
            let Some((slot, event)) = next else {
                break;
            };
            if event.cancelled.is_set() {
                trace!(event = %event.id, "discarding cancelled event");
                continue;
            }
            if let Slot::Timed(key) = slot {
                self.inner.clock.advance_to(key.time);
            }
            let before = self.events_processed();
            self.dispatch(event)?;
            executed += self.events_processed() - before;
        }
        Ok(executed)
    }

    fn dispatch(&self, event: Event<S>) -> SchedulerResult<()> {
        let Event {
            id,
            source,
            description,
            invocation,
            action,
            ..
        } = event;
        match invocation {
            Invocation::Direct => self.invoke(id, source, description, action),
            Invocation::Routed => {
                trace!(event = %id, ?source, %description, "routing");
                action().map_err(|cause| self.fail(id, source, description, cause))
            }
        }
    }

    /// Run one user action as `source`: trace it, count it, and halt the
    /// executor if it fails.
    pub(crate) fn invoke(
        &self,
        id: EventId,
        source: S,
        description: String,
        action: Action,
    ) -> SchedulerResult<()> {
        let now = self.current_time();
        trace!(event = %id, %now, ?source, %description, "dispatching");

        {
            let mut state = self.inner.state.borrow_mut();
            state.events_processed += 1;
            if let Some(log) = state.trace.as_mut() {
                log.record(TraceEntry {
                    time: now,
                    event_id: id,
                    source,
                    description: description.clone(),
                });
            }
        }

        let result = {
            let _active = self.inner.tracker.enter(source);
            action()
        };

        result.map_err(|cause| self.fail(id, source, description, cause))
    }

    /// Halt and build the error reported for a failed event.
    ///
    /// A routed event that fails because a user action it invoked failed
    /// passes that action's `ActionFailed` through unchanged.
    fn fail(
        &self,
        id: EventId,
        source: S,
        description: String,
        cause: anyhow::Error,
    ) -> SchedulerError {
        self.inner.state.borrow_mut().halted = true;
        let cause = match cause.downcast::<SchedulerError>() {
            Ok(failed @ SchedulerError::ActionFailed { .. }) => return failed,
            Ok(other) => anyhow::Error::from(other),
            Err(cause) => cause,
        };
        warn!(event = %id, ?source, %description, error = %cause, "action failed, halting executor");
        SchedulerError::ActionFailed {
            event: id,
            description,
            cause,
        }
    }

    // ── Diagnostics ───────────────────────────────────────────

    /// Queued events that will still execute.
    pub fn pending_count(&self) -> usize {
        self.inner.state.borrow().queues.live_count()
    }

    /// Queued events that will still execute, in dispatch order.
    pub fn pending_events(&self) -> Vec<PendingEvent<S>> {
        self.inner.state.borrow().queues.pending()
    }

    /// `true` when nothing is left to dispatch.
    pub fn is_idle(&self) -> bool {
        self.inner.state.borrow().queues.is_empty()
    }

    /// Total user actions invoked so far.
    pub fn events_processed(&self) -> u64 {
        self.inner.state.borrow().events_processed
    }

    /// Start recording a [`DispatchTrace`] of invoked user actions.
    /// Idempotent.
    pub fn enable_trace(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.trace.is_none() {
            state.trace = Some(DispatchTrace::new());
        }
    }

    /// A copy of the trace recorded so far, if enabled.
    pub fn trace(&self) -> Option<DispatchTrace<S>> {
        self.inner.state.borrow().trace.clone()
    }
}

/// Clears the running flag when the loop exits, including on unwind.
struct RunningGuard<'a, S> {
    inner: &'a ExecutorInner<S>,
}

impl<S> Drop for RunningGuard<'_, S> {
    fn drop(&mut self) {
        self.inner.state.borrow_mut().running = false;
    }
}
