//! Adaptive priority event scheduling for emulator frontends.
//!
//! This crate contains the platform-agnostic scheduling engine: a bounded
//! priority queue with readiness-aware extraction, a load-driven due-time
//! regulator, a periodic event registry and per-kind subscriber dispatch.
//! Frontends drive it through the [`scheduler`] facade, one tick per logical
//! time step.

/// Per-kind subscriber lists and registration handles.
pub mod callbacks;

/// Scheduler tunables.
pub mod config;

/// Error type shared by every fallible operation.
pub mod error;

/// Event kinds, priorities and payload ownership.
pub mod event;

/// Recurring event templates.
pub mod periodic;

/// Queue controller: scheduling, cancellation and purge on top of the store.
pub mod queue;

/// Load-adaptive due-time adjustment.
pub mod regulator;

/// Tick driver and public scheduling surface.
pub mod scheduler;

/// Dispatch counters and processing-time measurement.
pub mod stats;

/// Bounded binary heap of scheduled items.
pub mod store;

pub use callbacks::CallbackId;
pub use config::SchedulerConfig;
pub use error::SchedError;
pub use event::{Event, EventKind, Payload, Priority, Timestamp};
pub use periodic::PeriodicId;
pub use scheduler::{EventContext, Scheduler};
pub use stats::{ProcessingClock, SchedulerStats};
