//! Executor configuration.

use crate::event::SourceType;
use crate::time::VirtualTime;

/// Construction-time options for an [`Executor`](crate::Executor) and the
/// [`Simulation`](crate::Simulation) built around it.
///
/// # Example
/// ```rust
/// use eventide::{SchedulerConfig, VirtualTime};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Thread { Io, Compute }
///
/// let config = SchedulerConfig::new([Thread::Io, Thread::Compute])
///     .initial_time(VirtualTime::new(1_000))
///     .start_paused(false);
/// assert_eq!(config.source_types.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig<S> {
    /// Clock reading before the first dispatch.
    pub initial_time: VirtualTime,
    /// Whether dispatch starts suspended until `resume` is called.
    pub start_paused: bool,
    /// Every source allowed to submit work. Duplicates are ignored.
    pub source_types: Vec<S>,
}

impl<S: SourceType> SchedulerConfig<S> {
    /// A paused executor at time zero serving `sources`.
    ///
    /// Starting paused lets callers seed a batch of events before any of
    /// them runs.
    pub fn new(sources: impl IntoIterator<Item = S>) -> Self {
        let mut source_types: Vec<S> = Vec::new();
        for source in sources {
            if !source_types.contains(&source) {
                source_types.push(source);
            }
        }
        SchedulerConfig {
            initial_time: VirtualTime::ZERO,
            start_paused: true,
            source_types,
        }
    }

    /// Set the clock's starting instant.
    pub fn initial_time(mut self, time: VirtualTime) -> Self {
        self.initial_time = time;
        self
    }

    /// Choose whether dispatch starts suspended.
    pub fn start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }

    /// Add one more source.
    pub fn source(mut self, source: S) -> Self {
        if !self.source_types.contains(&source) {
            self.source_types.push(source);
        }
        self
    }
}
