use serde::{Deserialize, Serialize};

use crate::error::SchedError;
use crate::periodic::DEFAULT_PERIODIC_SLOTS;
use crate::regulator::{DEFAULT_HIGH_LOAD_THRESHOLD, DEFAULT_LOW_PRIORITY_DEFERRAL};
use crate::stats::DEFAULT_STATS_WINDOW;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_EVENTS_PER_TICK: u32 = 100;

/// Tunables for a [`crate::scheduler::Scheduler`].
///
/// Missing keys fall back to the defaults, so an empty TOML table is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub queue_capacity: usize,
    pub max_events_per_tick: u32,
    pub periodic_slots: usize,
    /// Load strictly above this value triggers regulation.
    pub high_load_threshold: f32,
    /// Time units added to Low events per regulated tick.
    pub low_priority_deferral: u64,
    /// Length of the events-per-second window in time units.
    pub stats_window: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_events_per_tick: DEFAULT_MAX_EVENTS_PER_TICK,
            periodic_slots: DEFAULT_PERIODIC_SLOTS,
            high_load_threshold: DEFAULT_HIGH_LOAD_THRESHOLD,
            low_priority_deferral: DEFAULT_LOW_PRIORITY_DEFERRAL,
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }
}

impl SchedulerConfig {
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SchedError> {
        if self.queue_capacity == 0 {
            return Err(SchedError::InvalidArgument("queue-capacity must be non-zero"));
        }
        if self.max_events_per_tick == 0 {
            return Err(SchedError::InvalidArgument(
                "max-events-per-tick must be non-zero",
            ));
        }
        if self.periodic_slots == 0 {
            return Err(SchedError::InvalidArgument("periodic-slots must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.high_load_threshold) {
            return Err(SchedError::InvalidArgument(
                "high-load-threshold must be within [0, 1]",
            ));
        }
        if self.stats_window == 0 {
            return Err(SchedError::InvalidArgument("stats-window must be non-zero"));
        }
        Ok(())
    }
}
