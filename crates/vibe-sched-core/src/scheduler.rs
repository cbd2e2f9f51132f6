//! Tick-driven event scheduler.
//!
//! A [`Scheduler`] owns its queue, periodic registry and subscriber table, so
//! several schedulers can coexist in one process. It is driven cooperatively:
//! the frontend calls [`Scheduler::tick`] once per logical time step with a
//! monotonically advancing timestamp, and every subscriber runs inline on
//! that call.
//!
//! The engine has no internal locking. Wrap the whole scheduler in a single
//! `Mutex` if it must be reached from more than one thread.

use log::{debug, trace};

use crate::callbacks::{CallbackId, CallbackTable};
use crate::config::SchedulerConfig;
use crate::error::SchedError;
use crate::event::{Event, EventKind, Priority, Timestamp};
use crate::periodic::{PeriodicId, PeriodicRegistry};
use crate::queue::EventQueue;
use crate::regulator::{LoadRegulator, clamp_load};
use crate::stats::{DispatchStats, MonotonicClock, ProcessingClock, SchedulerStats};

/// Scheduling surface shared by the scheduler and its subscribers.
///
/// Subscribers receive one during dispatch; [`Scheduler`] builds one for its
/// own scheduling methods.
pub struct EventContext<'a> {
    queue: &'a mut EventQueue,
    periodic: &'a mut PeriodicRegistry,
    dropped: &'a mut u64,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(
        queue: &'a mut EventQueue,
        periodic: &'a mut PeriodicRegistry,
        dropped: &'a mut u64,
    ) -> Self {
        Self {
            queue,
            periodic,
            dropped,
        }
    }

    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        self.queue.now()
    }

    /// Live events waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.size()
    }

    /// Schedules a one-shot event `delay` time units from now. The payload is
    /// copied.
    pub fn schedule(
        &mut self,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        delay: u64,
    ) -> Result<(), SchedError> {
        self.queue
            .push(kind, data, priority, delay)
            .inspect_err(|e| self.note_drop(kind, e))
    }

    /// Schedules a recurring event. `repeat_count` of 0 repeats forever.
    pub fn schedule_periodic(
        &mut self,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        interval: u64,
        repeat_count: u32,
    ) -> Result<PeriodicId, SchedError> {
        self.periodic
            .schedule(self.queue, kind, data, priority, interval, repeat_count)
            .inspect_err(|e| self.note_drop(kind, e))
    }

    pub fn cancel(&mut self, kind: EventKind, matcher: Option<&[u8]>) -> bool {
        self.queue.cancel(kind, matcher)
    }

    pub fn cancel_periodic(&mut self, id: PeriodicId) -> bool {
        self.periodic.cancel(self.queue, id)
    }

    fn note_drop(&mut self, kind: EventKind, err: &SchedError) {
        if matches!(
            err,
            SchedError::CapacityExceeded { .. } | SchedError::AllocationFailed { .. }
        ) {
            *self.dropped += 1;
            debug!("Dropped {kind:?} event: {err}");
        }
    }
}

/// Adaptive priority event scheduler.
pub struct Scheduler {
    queue: EventQueue,
    periodic: PeriodicRegistry,
    callbacks: CallbackTable,
    regulator: LoadRegulator,
    stats: DispatchStats,
    clock: Box<dyn ProcessingClock>,
    paused: bool,
    system_load: f32,
    max_events_per_tick: u32,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedError> {
        Self::with_clock(config, MonotonicClock::new())
    }

    /// Builds a scheduler with default settings and the given queue capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self, SchedError> {
        Self::new(SchedulerConfig::with_capacity(capacity))
    }

    /// Builds a scheduler that measures dispatch cost with `clock`.
    pub fn with_clock(
        config: SchedulerConfig,
        clock: impl ProcessingClock + 'static,
    ) -> Result<Self, SchedError> {
        config.validate()?;
        Ok(Self {
            queue: EventQueue::new(config.queue_capacity)?,
            periodic: PeriodicRegistry::new(config.periodic_slots),
            callbacks: CallbackTable::new(),
            regulator: LoadRegulator::new(
                config.high_load_threshold,
                config.low_priority_deferral,
            ),
            stats: DispatchStats::new(config.stats_window),
            clock: Box::new(clock),
            paused: false,
            system_load: 0.0,
            max_events_per_tick: config.max_events_per_tick,
        })
    }

    fn context(&mut self) -> EventContext<'_> {
        EventContext::new(&mut self.queue, &mut self.periodic, &mut self.stats.dropped)
    }

    pub fn schedule(
        &mut self,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        delay: u64,
    ) -> Result<(), SchedError> {
        self.context().schedule(kind, data, priority, delay)
    }

    pub fn schedule_periodic(
        &mut self,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        interval: u64,
        repeat_count: u32,
    ) -> Result<PeriodicId, SchedError> {
        self.context()
            .schedule_periodic(kind, data, priority, interval, repeat_count)
    }

    /// Cancels queued events of `kind`, optionally only those whose payload
    /// equals `matcher`. Canceled events stay in the queue until a purge.
    pub fn cancel(&mut self, kind: EventKind, matcher: Option<&[u8]>) -> bool {
        self.queue.cancel(kind, matcher)
    }

    /// Stops a periodic event and cancels every queued event of its kind.
    pub fn cancel_periodic(&mut self, id: PeriodicId) -> bool {
        self.periodic.cancel(&mut self.queue, id)
    }

    /// Runs one logical time step and returns the number of events
    /// dispatched.
    ///
    /// `max_events` of 0, or above the configured ceiling, uses the ceiling.
    pub fn tick(&mut self, now: Timestamp, max_events: u32) -> u32 {
        if self.paused {
            return 0;
        }

        self.queue.update(now);

        let report = self.periodic.update(&mut self.queue);
        self.stats.record_dropped(report.dropped);

        self.regulator.adapt(&mut self.queue, self.system_load);

        let budget = if max_events != 0 && max_events <= self.max_events_per_tick {
            max_events
        } else {
            self.max_events_per_tick
        };

        let started = self.clock.elapsed();
        let mut processed = 0;
        while processed < budget {
            let Some(event) = self.queue.pop() else {
                break;
            };
            let mut ctx =
                EventContext::new(&mut self.queue, &mut self.periodic, &mut self.stats.dropped);
            self.callbacks.dispatch(&event, &mut ctx);
            processed += 1;
        }
        let elapsed = self.clock.elapsed().saturating_sub(started);

        self.stats.record_tick(now, processed, elapsed);
        trace!(
            "tick {now}: dispatched {processed}/{budget}, {} queued, {} periodic fired",
            self.queue.size(),
            report.enqueued
        );
        processed
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn register_callback<F>(&mut self, kind: EventKind, callback: F) -> CallbackId
    where
        F: FnMut(&Event, &mut EventContext<'_>) + Send + 'static,
    {
        self.callbacks.register(kind, callback)
    }

    pub fn unregister_callback(&mut self, kind: EventKind, id: CallbackId) -> bool {
        self.callbacks.unregister(kind, id)
    }

    /// Sets the load sample used by the next ticks, clamped to `[0, 1]`.
    pub fn set_system_load(&mut self, load: f32) {
        self.system_load = clamp_load(load);
    }

    pub fn system_load(&self) -> f32 {
        self.system_load
    }

    pub fn set_max_events_per_tick(&mut self, max_events: u32) {
        self.max_events_per_tick = max_events.max(1);
    }

    pub fn max_events_per_tick(&self) -> u32 {
        self.max_events_per_tick
    }

    /// Removes canceled events from the queue.
    pub fn purge(&mut self) -> usize {
        self.queue.purge()
    }

    /// Drops every queued event. Periodic descriptors stay registered.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Next event the scheduler would dispatch at the current time.
    pub fn peek(&self) -> Option<&Event> {
        self.queue.peek()
    }

    /// Timestamp of the last tick.
    pub fn timestamp(&self) -> Timestamp {
        self.queue.now()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.queue.size(),
            events_per_second: self.stats.events_per_second(),
            avg_processing_time: self.stats.avg_processing_time(),
            total_processed: self.stats.total_processed,
            dropped: self.stats.dropped(),
            ticks: self.stats.samples,
            periodic_active: self.periodic.active_count(),
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn periodic(&self) -> &PeriodicRegistry {
        &self.periodic
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue", &self.queue)
            .field("periodic", &self.periodic)
            .field("callbacks", &self.callbacks)
            .field("paused", &self.paused)
            .field("system_load", &self.system_load)
            .field("max_events_per_tick", &self.max_events_per_tick)
            .finish_non_exhaustive()
    }
}
