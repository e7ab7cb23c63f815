//! Structured error types for the scheduler.
//!
//! All fallible public APIs return `Result<T, SchedulerError>`. Usage
//! errors (scheduling in the past, delaying from the wrong context) are
//! reported to the caller and leave the executor intact; a failed action
//! halts the run loop.

use thiserror::Error;

use crate::event::EventId;
use crate::time::VirtualTime;

/// Why a `delay_execution_until` request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelayRejection {
    /// The release time is earlier than the current virtual time.
    InPast {
        requested: VirtualTime,
        current: VirtualTime,
    },

    /// The caller is not an action currently executing as this source.
    OutsideSourceContext { active: Option<String> },

    /// The source is already paused; stacked pauses are not supported.
    AlreadyPaused { release_time: VirtualTime },
}

impl std::fmt::Display for DelayRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayRejection::InPast { requested, current } => write!(
                f,
                "release time {} is before current time {}",
                requested, current
            ),
            DelayRejection::OutsideSourceContext { active: Some(active) } => {
                write!(f, "called while {} is executing", active)
            }
            DelayRejection::OutsideSourceContext { active: None } => {
                write!(f, "called outside any executing event")
            }
            DelayRejection::AlreadyPaused { release_time } => {
                write!(f, "source is already paused until {}", release_time)
            }
        }
    }
}

/// The top-level error type for the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Attempted to schedule an event before the current virtual time.
    #[error("cannot schedule event at {requested} when current time is {current}")]
    InvalidSchedule {
        requested: VirtualTime,
        current: VirtualTime,
    },

    /// A source delay request was rejected.
    #[error("invalid delay for source {source_type}: {reason}")]
    InvalidDelay {
        source_type: String,
        reason: DelayRejection,
    },

    /// The source tracker was queried with no event executing.
    #[error("no event is currently executing")]
    NoActiveSource,

    /// A source type that was not part of the configuration.
    #[error("source type {source_type} is not registered with this executor")]
    UnknownSource { source_type: String },

    /// A scheduled action returned an error; the run was aborted.
    #[error("event {event} ({description}) failed")]
    ActionFailed {
        event: EventId,
        description: String,
        #[source]
        cause: anyhow::Error,
    },

    /// The executor was halted and will not dispatch further events.
    #[error("executor has been halted")]
    Halted,
}

/// Convenience alias for `Result<T, SchedulerError>`.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
