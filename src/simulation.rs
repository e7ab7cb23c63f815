//! Simulation facade.
//!
//! Wires one [`Executor`], its [`SourceTracker`] and exactly one
//! [`SourceScheduler`] per configured source type. Handing out clones of
//! that single scheduler is what keeps a source's pause state unique.

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::event::SourceType;
use crate::executor::Executor;
use crate::queue::PendingEvent;
use crate::source::SourceScheduler;
use crate::time::VirtualTime;
use crate::trace::DispatchTrace;
use crate::tracker::SourceTracker;

/// Top-level simulation driver.
///
/// # Example
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use eventide::{SchedulerConfig, Simulation, VirtualTime};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Thread { Io, Compute }
///
/// let sim = Simulation::new(SchedulerConfig::new([Thread::Io, Thread::Compute]));
/// let io = sim.scheduler(Thread::Io).unwrap();
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = Rc::clone(&seen);
/// let clock = io.clone();
/// io.do_at(VirtualTime::new(5), move || {
///     log.borrow_mut().push(clock.get_time());
///     Ok(())
/// })
/// .unwrap();
///
/// sim.resume().unwrap();
/// assert_eq!(*seen.borrow(), vec![VirtualTime::new(5)]);
/// ```
pub struct Simulation<S> {
    executor: Executor<S>,
    schedulers: HashMap<S, SourceScheduler<S>>,
    order: Vec<S>,
}

impl<S: SourceType> Simulation<S> {
    /// Build the executor and one scheduler per configured source.
    pub fn new(config: SchedulerConfig<S>) -> Self {
        let executor = Executor::new(&config);
        let mut schedulers = HashMap::with_capacity(config.source_types.len());
        let mut order = Vec::with_capacity(config.source_types.len());
        for source in config.source_types {
            if schedulers.contains_key(&source) {
                continue;
            }
            // Every configured source is known to the executor just built.
            if let Ok(scheduler) = SourceScheduler::new(executor.clone(), source) {
                schedulers.insert(source, scheduler);
                order.push(source);
            }
        }
        Simulation {
            executor,
            schedulers,
            order,
        }
    }

    /// The scheduler for `source`.
    pub fn scheduler(&self, source: S) -> SchedulerResult<SourceScheduler<S>> {
        self.schedulers
            .get(&source)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownSource {
                source_type: format!("{:?}", source),
            })
    }

    /// Configured sources in configuration order.
    pub fn source_types(&self) -> &[S] {
        &self.order
    }

    pub fn executor(&self) -> &Executor<S> {
        &self.executor
    }

    pub fn tracker(&self) -> SourceTracker<S> {
        self.executor.tracker()
    }

    pub fn current_time(&self) -> VirtualTime {
        self.executor.current_time()
    }

    // ── Run control ───────────────────────────────────────────

    pub fn pause(&self) {
        self.executor.pause();
    }

    /// Lift the executor pause and run until idle.
    pub fn resume(&self) -> SchedulerResult<u64> {
        self.executor.resume()
    }

    pub fn run(&self) -> SchedulerResult<u64> {
        self.executor.run()
    }

    pub fn run_for(&self, max_steps: u64) -> SchedulerResult<u64> {
        self.executor.run_for(max_steps)
    }

    pub fn halt(&self) {
        self.executor.halt();
    }

    // ── Diagnostics ───────────────────────────────────────────

    /// Sources that are currently stalled.
    pub fn paused_sources(&self) -> Vec<S> {
        self.order
            .iter()
            .copied()
            .filter(|source| self.schedulers[source].is_paused())
            .collect()
    }

    /// Everything still due to run: the executor's queues in dispatch
    /// order, then the work each paused source has parked, in
    /// configuration order.
    pub fn pending_events(&self) -> Vec<PendingEvent<S>> {
        let mut pending = self.executor.pending_events();
        for source in &self.order {
            pending.extend(self.schedulers[source].deferred_events());
        }
        pending
    }

    pub fn events_processed(&self) -> u64 {
        self.executor.events_processed()
    }

    pub fn enable_trace(&self) {
        self.executor.enable_trace();
    }

    pub fn trace(&self) -> Option<DispatchTrace<S>> {
        self.executor.trace()
    }
}
