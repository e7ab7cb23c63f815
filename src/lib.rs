//! # Eventide: deterministic virtual-time scheduling
//!
//! The scheduling core of a discrete-event simulation. Independent logical
//! sources submit immediate and timed work to one shared executor, which
//! runs it in a single, repeatable global order on a virtual clock. No
//! threads, no wall-clock time.
//!
//! A source can be *paused* to model a stall such as a garbage-collection
//! pause: its work is held back until a release time and then replayed
//! deterministically, while other sources carry on.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │            Simulation                 │ ← wiring from SchedulerConfig
//! │  ┌────────────────────────────────┐  │
//! │  │  SourceScheduler (per source)   │  │ ← tagging + pause/release
//! │  └────────────────────────────────┘  │
//! │  ┌────────────────────────────────┐  │
//! │  │  Executor                       │  │ ← dispatch loop
//! │  │   ┌───────────┐ ┌────────────┐ │  │
//! │  │   │ immediate │ │ timed heap │ │  │ ← event queues
//! │  │   └───────────┘ └────────────┘ │  │
//! │  │   ┌───────────┐ ┌────────────┐ │  │
//! │  │   │  clock    │ │  tracker   │ │  │ ← VirtualTime, active source
//! │  │   └───────────┘ └────────────┘ │  │
//! │  └────────────────────────────────┘  │
//! └──────────────────────────────────────┘
//! ```

pub mod cancelable;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod queue;
pub mod simulation;
pub mod source;
pub mod time;
pub mod trace;
pub mod tracker;

// Re-exports for convenience.
pub use cancelable::Cancelable;
pub use config::SchedulerConfig;
pub use error::{DelayRejection, SchedulerError, SchedulerResult};
pub use event::{Action, EventId, SourceType};
pub use executor::Executor;
pub use queue::PendingEvent;
pub use simulation::Simulation;
pub use source::SourceScheduler;
pub use time::{SharedClock, TimeProvider, VirtualTime};
pub use trace::{DispatchTrace, TraceEntry};
pub use tracker::SourceTracker;
