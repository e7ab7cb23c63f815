//! Source-scoped scheduling with simulated stalls.
//!
//! A [`SourceScheduler`] is the view one logical source has of the shared
//! [`Executor`]. Besides tagging submissions with its source type it can
//! *pause* the source: [`delay_execution_until`] models a stall (a long GC
//! pause, a blocked thread) during which the source observes nothing, while
//! every other source keeps running on the shared clock.
//!
//! While a source is paused:
//!
//! - new `do_now` work for it is parked in a deferred immediate backlog;
//! - new `do_at` work due before the release time is parked in a deferred
//!   timed backlog;
//! - work queued *before* the pause is intercepted when the executor
//!   dispatches it and parked the same way.
//!
//! When the release time arrives the backlog is replayed in one dispatch:
//! immediate work first (signals that arrived during the stall), then the
//! delayed timers, which are re-queued ahead of anything else due at the
//! release instant. Parked work is only traced and counted when it finally
//! runs. If a replayed action fails, whatever it left behind goes back on
//! the executor's queues, where it stays visible but never runs.
//!
//! [`delay_execution_until`]: SourceScheduler::delay_execution_until

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::cancelable::{CancelFlag, Cancelable};
use crate::error::{DelayRejection, SchedulerError, SchedulerResult};
use crate::event::{Action, EventId, SourceType, TimedKey};
use crate::executor::{Executor, WeakExecutor};
use crate::queue::PendingEvent;
use crate::time::VirtualTime;
use crate::tracker::SourceTracker;

/// Work parked while its source is paused.
struct Deferred {
    id: EventId,
    description: String,
    cancelled: CancelFlag,
    action: Action,
}

/// Parked timed work remembers the instant it was originally due.
struct DeferredTimed {
    origin: VirtualTime,
    work: Deferred,
}

struct PauseState {
    release_time: VirtualTime,
    /// Keyed by id so intercepted and newly submitted work interleave in
    /// submission order.
    deferred_immediate: BTreeMap<EventId, Deferred>,
    deferred_timed: Vec<DeferredTimed>,
}

enum SourceState {
    Running,
    Paused(PauseState),
    /// Inside the release dispatch, draining the immediate backlog.
    Releasing {
        backlog: BTreeMap<EventId, Deferred>,
    },
}

impl SourceState {
    /// Park `work` if the source is paused; hand it back otherwise.
    fn try_defer(&mut self, origin: Option<VirtualTime>, work: Deferred) -> Option<Deferred> {
        let SourceState::Paused(pause) = self else {
            return Some(work);
        };
        match origin {
            Some(origin) => pause.deferred_timed.push(DeferredTimed { origin, work }),
            None => {
                pause.deferred_immediate.insert(work.id, work);
            }
        }
        None
    }
}

/// A named facade over the shared [`Executor`].
///
/// Obtain one per source from a [`Simulation`](crate::Simulation); clones
/// share the same pause state.
pub struct SourceScheduler<S> {
    source: S,
    executor: Executor<S>,
    state: Rc<RefCell<SourceState>>,
}

impl<S: Copy> Clone for SourceScheduler<S> {
    fn clone(&self) -> Self {
        SourceScheduler {
            source: self.source,
            executor: self.executor.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

/// What the scheduler's own queued closures hold on to.
struct WeakSourceScheduler<S> {
    source: S,
    executor: WeakExecutor<S>,
    state: Rc<RefCell<SourceState>>,
}

impl<S: SourceType> WeakSourceScheduler<S> {
    fn upgrade(self) -> Option<SourceScheduler<S>> {
        Some(SourceScheduler {
            source: self.source,
            executor: self.executor.upgrade()?,
            state: self.state,
        })
    }
}

impl<S: SourceType> std::fmt::Debug for SourceScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceScheduler")
            .field("source", &self.source)
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl<S: SourceType> SourceScheduler<S> {
    pub(crate) fn new(executor: Executor<S>, source: S) -> SchedulerResult<Self> {
        if !executor.knows_source(source) {
            return Err(SchedulerError::UnknownSource {
                source_type: format!("{:?}", source),
            });
        }
        Ok(SourceScheduler {
            source,
            executor,
            state: Rc::new(RefCell::new(SourceState::Running)),
        })
    }

    /// The source type this scheduler submits as.
    pub fn source_type(&self) -> S {
        self.source
    }

    /// The executor shared by all sources.
    pub fn executor(&self) -> &Executor<S> {
        &self.executor
    }

    pub fn tracker(&self) -> SourceTracker<S> {
        self.executor.tracker()
    }

    /// Current virtual time. The clock is shared, so this is valid even
    /// while this source is paused.
    pub fn get_time(&self) -> VirtualTime {
        self.executor.current_time()
    }

    /// Alias of [`get_time`](Self::get_time).
    pub fn current_time(&self) -> VirtualTime {
        self.get_time()
    }

    pub fn is_paused(&self) -> bool {
        matches!(*self.state.borrow(), SourceState::Paused(_))
    }

    /// When the current pause ends, if paused.
    pub fn release_time(&self) -> Option<VirtualTime> {
        match &*self.state.borrow() {
            SourceState::Paused(pause) => Some(pause.release_time),
            _ => None,
        }
    }

    /// Work parked by the current pause, in replay order.
    ///
    /// Parked timers report the release time as their dispatch time.
    /// Empty while the source runs normally.
    pub fn deferred_events(&self) -> Vec<PendingEvent<S>> {
        let state = self.state.borrow();
        let (release_time, immediate, timed) = match &*state {
            SourceState::Paused(pause) => (
                Some(pause.release_time),
                &pause.deferred_immediate,
                pause.deferred_timed.as_slice(),
            ),
            SourceState::Releasing { backlog } => (None, backlog, &[][..]),
            SourceState::Running => return Vec::new(),
        };
        let mut timed: Vec<&DeferredTimed> = timed.iter().collect();
        timed.sort_by_key(|parked| (parked.origin, parked.work.id));

        immediate
            .values()
            .map(|work| (None, work))
            .chain(timed.into_iter().map(|parked| (release_time, &parked.work)))
            .filter(|(_, work)| !work.cancelled.is_set())
            .map(|(time, work)| PendingEvent {
                id: work.id,
                time,
                source: self.source,
                description: work.description.clone(),
            })
            .collect()
    }

    fn downgrade(&self) -> WeakSourceScheduler<S> {
        WeakSourceScheduler {
            source: self.source,
            executor: self.executor.downgrade(),
            state: Rc::clone(&self.state),
        }
    }

    // ── Submission ────────────────────────────────────────────

    /// Run `action` at `time` as this source.
    pub fn do_at<F>(&self, time: VirtualTime, action: F) -> SchedulerResult<Cancelable>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.do_at_described(time, "", action)
    }

    /// Run `action` `delay` ticks from now as this source.
    pub fn do_in<F>(&self, delay: u64, action: F) -> SchedulerResult<Cancelable>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let now = self.get_time();
        // Saturating keeps an absurd delay at the end of time rather than wrapping.
        let time = now.plus(delay).unwrap_or(VirtualTime::new(u64::MAX));
        self.do_at_described(time, "", action)
    }

    /// Run `action` as soon as possible as this source.
    pub fn do_now<F>(&self, action: F) -> Cancelable
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.do_now_described("", action)
    }

    /// [`do_at`](Self::do_at) with a label for traces and diagnostics.
    pub fn do_at_described<F>(
        &self,
        time: VirtualTime,
        description: impl Into<String>,
        action: F,
    ) -> SchedulerResult<Cancelable>
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.executor.check_time(time)?;
        let work = Deferred {
            id: self.executor.reserve_id(),
            description: description.into(),
            cancelled: CancelFlag::default(),
            action: Box::new(action),
        };
        let handle = Cancelable::new(work.id, work.cancelled.clone());

        {
            let mut state = self.state.borrow_mut();
            if let SourceState::Paused(pause) = &mut *state {
                if time < pause.release_time {
                    debug!(source = ?self.source, event = %work.id, %time, "deferring timed event of paused source");
                    pause.deferred_timed.push(DeferredTimed { origin: time, work });
                    return Ok(handle);
                }
            }
        }

        self.forward_timed(TimedKey::normal(time, work.id), work);
        Ok(handle)
    }

    /// [`do_now`](Self::do_now) with a label for traces and diagnostics.
    pub fn do_now_described<F>(&self, description: impl Into<String>, action: F) -> Cancelable
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let work = Deferred {
            id: self.executor.reserve_id(),
            description: description.into(),
            cancelled: CancelFlag::default(),
            action: Box::new(action),
        };
        let handle = Cancelable::new(work.id, work.cancelled.clone());

        let work = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                SourceState::Paused(pause) => {
                    debug!(source = ?self.source, event = %work.id, "deferring immediate event of paused source");
                    pause.deferred_immediate.insert(work.id, work);
                    None
                }
                SourceState::Releasing { backlog } => {
                    backlog.insert(work.id, work);
                    None
                }
                SourceState::Running => Some(work),
            }
        };

        if let Some(work) = work {
            self.forward_now(work);
        }
        handle
    }

    /// Hand `work` to the executor, wrapped so that a dispatch during a
    /// later pause parks it instead of running it.
    fn forward_now(&self, work: Deferred) {
        let Deferred {
            id,
            description,
            cancelled,
            action,
        } = work;
        let wrapped = self.intercepting(id, description.clone(), cancelled.clone(), None, action);
        self.executor
            .submit_now(id, self.source, description, cancelled, wrapped);
    }

    fn forward_timed(&self, key: TimedKey, work: Deferred) {
        let Deferred {
            id,
            description,
            cancelled,
            action,
        } = work;
        let wrapped = self.intercepting(
            id,
            description.clone(),
            cancelled.clone(),
            Some(key.origin),
            action,
        );
        self.executor
            .submit_timed(key, self.source, description, cancelled, wrapped);
    }

    fn intercepting(
        &self,
        id: EventId,
        description: String,
        cancelled: CancelFlag,
        origin: Option<VirtualTime>,
        action: Action,
    ) -> Action {
        let weak = self.downgrade();
        Box::new(move || {
            let Some(this) = weak.upgrade() else {
                return Ok(());
            };
            let work = Deferred {
                id,
                description,
                cancelled,
                action,
            };
            let parked = this.state.borrow_mut().try_defer(origin, work);
            match parked {
                Some(work) => this.invoke(work).map_err(anyhow::Error::from),
                None => {
                    debug!(source = ?this.source, event = %id, "intercepted dispatch of paused source");
                    Ok(())
                }
            }
        })
    }

    fn invoke(&self, work: Deferred) -> SchedulerResult<()> {
        self.executor
            .invoke(work.id, self.source, work.description, work.action)
    }

    // ── Pause / release ───────────────────────────────────────

    /// Stall this source until `release_time`.
    ///
    /// Must be called from an action executing as this source. Other
    /// sources are unaffected. Fails with [`SchedulerError::InvalidDelay`]
    /// if `release_time` is in the past, if called from any other context,
    /// or if the source is already paused.
    pub fn delay_execution_until(&self, release_time: VirtualTime) -> SchedulerResult<()> {
        let current = self.get_time();
        if release_time < current {
            return Err(self.invalid_delay(DelayRejection::InPast {
                requested: release_time,
                current,
            }));
        }
        match self.executor.tracker().active_source_type() {
            Ok(active) if active == self.source => {}
            other => {
                return Err(self.invalid_delay(DelayRejection::OutsideSourceContext {
                    active: other.ok().map(|s| format!("{:?}", s)),
                }))
            }
        }

        {
            let mut state = self.state.borrow_mut();
            let deferred_immediate = match &mut *state {
                SourceState::Paused(pause) => {
                    return Err(self.invalid_delay(DelayRejection::AlreadyPaused {
                        release_time: pause.release_time,
                    }))
                }
                // Re-paused while replaying a backlog: the rest of it stays parked.
                SourceState::Releasing { backlog } => std::mem::take(backlog),
                SourceState::Running => BTreeMap::new(),
            };
            *state = SourceState::Paused(PauseState {
                release_time,
                deferred_immediate,
                deferred_timed: Vec::new(),
            });
        }

        info!(source = ?self.source, now = %current, until = %release_time, "source paused");
        let weak = self.downgrade();
        let id = self.executor.reserve_id();
        self.executor.submit_timed(
            TimedKey::normal(release_time, id),
            self.source,
            "release paused source".to_string(),
            CancelFlag::default(),
            Box::new(move || match weak.upgrade() {
                Some(this) => this.release(),
                None => Ok(()),
            }),
        );
        Ok(())
    }

    fn invalid_delay(&self, reason: DelayRejection) -> SchedulerError {
        SchedulerError::InvalidDelay {
            source_type: format!("{:?}", self.source),
            reason,
        }
    }

    /// Replay the backlog of the pause that ends now.
    fn release(&self) -> anyhow::Result<()> {
        let pause = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, SourceState::Running) {
                SourceState::Paused(pause) => pause,
                other => {
                    *state = other;
                    return Ok(());
                }
            }
        };
        let PauseState {
            release_time,
            deferred_immediate,
            deferred_timed,
        } = pause;
        info!(
            source = ?self.source,
            at = %release_time,
            immediate = deferred_immediate.len(),
            timed = deferred_timed.len(),
            "releasing paused source"
        );

        *self.state.borrow_mut() = SourceState::Releasing {
            backlog: deferred_immediate,
        };
        let drained = self.drain_backlog();
        let leftover = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, SourceState::Running) {
                SourceState::Releasing { backlog } => backlog,
                // Paused again: the rest of the backlog moved into the new pause.
                other => {
                    *state = other;
                    BTreeMap::new()
                }
            }
        };

        // Non-empty only when a drained action failed.
        for work in leftover.into_values() {
            if !work.cancelled.is_set() {
                self.forward_now(work);
            }
        }
        self.requeue_timed(release_time, deferred_timed);
        drained.map_err(anyhow::Error::from)
    }

    /// Re-queue delayed timers at `release_time` in the released lane,
    /// in original due order, then submission order.
    fn requeue_timed(&self, release_time: VirtualTime, mut deferred: Vec<DeferredTimed>) {
        deferred.sort_by_key(|parked| (parked.origin, parked.work.id));
        for DeferredTimed { origin, work } in deferred {
            if work.cancelled.is_set() {
                continue;
            }
            self.forward_timed(TimedKey::released(release_time, origin, work.id), work);
        }
    }

    /// Run the immediate backlog to exhaustion. Work this source submits
    /// while draining joins the same backlog.
    fn drain_backlog(&self) -> SchedulerResult<()> {
        loop {
            let next = match &mut *self.state.borrow_mut() {
                SourceState::Releasing { backlog } => backlog.pop_first(),
                // A drained action paused the source again.
                _ => None,
            };
            let Some((_, work)) = next else {
                return Ok(());
            };
            if work.cancelled.is_set() {
                continue;
            }
            self.invoke(work)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Src {
        T1,
        T2,
    }

    fn setup() -> (Executor<Src>, SourceScheduler<Src>, SourceScheduler<Src>) {
        let exec = Executor::new(&SchedulerConfig::new([Src::T1, Src::T2]));
        let one = SourceScheduler::new(exec.clone(), Src::T1).unwrap();
        let two = SourceScheduler::new(exec.clone(), Src::T2).unwrap();
        (exec, one, two)
    }

    fn t(ticks: u64) -> VirtualTime {
        VirtualTime::new(ticks)
    }

    #[test]
    fn test_unknown_source_rejected() {
        let exec = Executor::new(&SchedulerConfig::new([Src::T1]));
        assert!(matches!(
            SourceScheduler::new(exec, Src::T2),
            Err(SchedulerError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_delay_outside_event_rejected() {
        let (_exec, one, _two) = setup();
        let err = one.delay_execution_until(t(10)).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidDelay {
                reason: DelayRejection::OutsideSourceContext { active: None },
                ..
            }
        ));
    }

    #[test]
    fn test_delay_from_other_source_rejected() {
        let (exec, one, two) = setup();
        let result = Rc::new(RefCell::new(None));
        let out = Rc::clone(&result);
        let target = one.clone();
        two.do_now(move || {
            *out.borrow_mut() = Some(target.delay_execution_until(t(10)));
            Ok(())
        });
        exec.resume().unwrap();

        let result = result.borrow_mut().take().unwrap();
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidDelay {
                reason: DelayRejection::OutsideSourceContext { active: Some(ref active) },
                ..
            }) if active == "T2"
        ));
        assert!(!one.is_paused());
    }

    #[test]
    fn test_delay_into_past_rejected() {
        let (exec, one, _two) = setup();
        let result = Rc::new(RefCell::new(None));
        let out = Rc::clone(&result);
        let inner = one.clone();
        one.do_at(t(100), move || {
            *out.borrow_mut() = Some(inner.delay_execution_until(t(99)));
            Ok(())
        })
        .unwrap();
        exec.resume().unwrap();
        assert!(matches!(
            result.borrow_mut().take().unwrap(),
            Err(SchedulerError::InvalidDelay {
                reason: DelayRejection::InPast { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_nested_pause_rejected() {
        let (exec, one, _two) = setup();
        let second = Rc::new(RefCell::new(None));
        let out = Rc::clone(&second);
        let inner = one.clone();
        one.do_at(t(10), move || {
            inner.delay_execution_until(t(20))?;
            assert_eq!(inner.release_time(), Some(t(20)));
            *out.borrow_mut() = Some(inner.delay_execution_until(t(30)));
            Ok(())
        })
        .unwrap();
        exec.resume().unwrap();
        assert!(matches!(
            second.borrow_mut().take().unwrap(),
            Err(SchedulerError::InvalidDelay {
                reason: DelayRejection::AlreadyPaused { release_time },
                ..
            }) if release_time == t(20)
        ));
        assert!(!one.is_paused());
        assert_eq!(exec.current_time(), t(20));
    }

    #[test]
    fn test_cancelled_deferred_work_is_not_replayed() {
        let (exec, one, two) = setup();
        let ran = Rc::new(RefCell::new(Vec::new()));

        let pauser = one.clone();
        one.do_at(t(10), move || {
            pauser.delay_execution_until(t(50))?;
            Ok(())
        })
        .unwrap();

        let target = one.clone();
        let log = Rc::clone(&ran);
        two.do_at(t(20), move || {
            let log_now = Rc::clone(&log);
            let signal = target.do_now(move || {
                log_now.borrow_mut().push("signal");
                Ok(())
            });
            let log_at = Rc::clone(&log);
            let timer = target.do_at(t(30), move || {
                log_at.borrow_mut().push("timer");
                Ok(())
            })?;
            signal.cancel();
            timer.cancel();
            Ok(())
        })
        .unwrap();

        exec.resume().unwrap();
        assert!(ran.borrow().is_empty());
        assert!(!one.is_paused());
    }

    #[test]
    fn test_do_at_beyond_release_is_not_deferred() {
        let (exec, one, _two) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner = one.clone();
        let log = Rc::clone(&seen);
        one.do_at(t(10), move || {
            inner.delay_execution_until(t(20))?;
            let at = inner.clone();
            let log = Rc::clone(&log);
            inner.do_at(t(25), move || {
                log.borrow_mut().push(at.get_time().ticks());
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        exec.resume().unwrap();
        assert_eq!(*seen.borrow(), vec![25]);
    }

    #[test]
    fn test_do_in_is_relative_to_now() {
        let (exec, one, _two) = setup();
        let seen = Rc::new(RefCell::new(None));
        let inner = one.clone();
        let out = Rc::clone(&seen);
        one.do_at(t(40), move || {
            let at = inner.clone();
            inner.do_in(2, move || {
                *out.borrow_mut() = Some(at.get_time());
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        exec.resume().unwrap();
        assert_eq!(*seen.borrow(), Some(t(42)));
    }

    #[test]
    #[traced_test]
    fn test_pause_and_release_are_logged() {
        let (exec, one, _two) = setup();
        let inner = one.clone();
        one.do_at(t(10), move || {
            inner.delay_execution_until(t(15))?;
            Ok(())
        })
        .unwrap();
        exec.resume().unwrap();

        assert!(logs_contain("source paused"));
        assert!(logs_contain("releasing paused source"));
    }

    /// T1 stalls from 10 until 100 with a timer parked at 20. T2 signals T1
    /// at 30 through `signals`.
    fn stalled_with_backlog(
        signals: impl FnOnce(&SourceScheduler<Src>) + 'static,
    ) -> (Executor<Src>, SourceScheduler<Src>) {
        let (exec, one, two) = setup();
        let pauser = one.clone();
        one.do_at(t(10), move || {
            pauser.delay_execution_until(t(100))?;
            Ok(())
        })
        .unwrap();
        one.do_at_described(t(20), "deferred_timer", || Ok(())).unwrap();
        let target = one.clone();
        two.do_at_described(t(30), "sender", move || {
            signals(&target);
            Ok(())
        })
        .unwrap();
        (exec, one)
    }

    #[test]
    fn test_failing_drained_action_keeps_remaining_work_queued() {
        let bad = Rc::new(RefCell::new(None));
        let bad_out = Rc::clone(&bad);
        let (exec, one) = stalled_with_backlog(move |target| {
            let handle = target.do_now_described("bad_signal", || Err(anyhow::anyhow!("boom")));
            *bad_out.borrow_mut() = Some(handle.id());
            target.do_now_described("second_signal", || Ok(()));
        });

        let err = exec.resume().unwrap_err();
        let bad_id = bad.borrow().unwrap();
        assert!(matches!(
            err,
            SchedulerError::ActionFailed { event, ref description, .. }
                if event == bad_id && description == "bad_signal"
        ));
        assert!(exec.is_halted());
        assert!(!one.is_paused());

        let pending: Vec<(Option<u64>, String)> = exec
            .pending_events()
            .into_iter()
            .map(|p| (p.time.map(VirtualTime::ticks), p.description))
            .collect();
        assert_eq!(
            pending,
            vec![
                (None, "second_signal".to_string()),
                (Some(100), "deferred_timer".to_string()),
            ]
        );
    }

    #[test]
    fn test_parked_work_counted_when_it_runs() {
        let (exec, _one) = stalled_with_backlog(|target| {
            target.do_now_described("signal", || Ok(()));
        });
        exec.enable_trace();

        // pauser, sender, then signal and timer at the release.
        assert_eq!(exec.resume().unwrap(), 4);
        assert_eq!(exec.events_processed(), 4);
        let trace = exec.trace().unwrap();
        let entries: Vec<(u64, &str)> = trace
            .entries()
            .iter()
            .map(|e| (e.time.ticks(), e.description.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![(10, ""), (30, "sender"), (100, "signal"), (100, "deferred_timer")]
        );
    }

    #[test]
    fn test_deferred_events_in_replay_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = Rc::clone(&seen);
        let (exec, one) = stalled_with_backlog(move |target| {
            target.do_now_described("signal", || Ok(()));
            let dropped = target.do_now_described("dropped", || Ok(()));
            dropped.cancel();
            *out.borrow_mut() = target.deferred_events();
        });
        assert!(one.deferred_events().is_empty());
        exec.resume().unwrap();

        let seen: Vec<(Option<u64>, String)> = seen
            .borrow()
            .iter()
            .map(|p| (p.time.map(VirtualTime::ticks), p.description.clone()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (None, "signal".to_string()),
                (Some(100), "deferred_timer".to_string()),
            ]
        );
        assert!(one.deferred_events().is_empty());
    }

    #[test]
    fn test_queued_release_does_not_keep_executor_alive() {
        let (exec, one, two) = setup();
        let weak = exec.downgrade();
        let pauser = one.clone();
        let stopper = exec.clone();
        one.do_at(t(10), move || {
            pauser.delay_execution_until(t(50))?;
            stopper.pause();
            Ok(())
        })
        .unwrap();
        one.do_at(t(20), || Ok(())).unwrap();

        exec.resume().unwrap();
        assert!(one.is_paused());
        assert_eq!(exec.pending_count(), 2);

        drop((exec, one, two));
        assert!(weak.upgrade().is_none());
    }
}
