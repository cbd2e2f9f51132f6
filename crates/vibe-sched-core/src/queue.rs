use log::debug;

use crate::error::SchedError;
use crate::event::{Event, EventKind, Payload, Priority, Timestamp};
use crate::store::{EventStore, ScheduledItem};

/// Count of live (non-canceled) items per priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriorityHistogram {
    pub low: usize,
    pub normal: usize,
    pub high: usize,
    pub critical: usize,
}

/// Bounded priority queue of scheduled events with a logical clock.
///
/// Cancellation only marks items; they keep occupying a slot until
/// [`EventQueue::purge`] compacts them away. A full queue rejects new events,
/// which is the only backpressure the scheduler applies.
#[derive(Debug)]
pub struct EventQueue {
    store: EventStore,
    now: Timestamp,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Result<Self, SchedError> {
        Ok(Self {
            store: EventStore::with_capacity(capacity)?,
            now: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Physical slots in use, tombstones included.
    #[inline]
    pub fn slots_used(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.store.is_full()
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Sets the logical clock. Nothing is dispatched here.
    pub fn update(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Schedules a one-shot event, copying `data` into a private buffer.
    pub fn push(
        &mut self,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        delay: u64,
    ) -> Result<(), SchedError> {
        // Check before copying so a rejected event never allocates.
        if self.store.is_full() {
            return Err(SchedError::CapacityExceeded {
                capacity: self.store.capacity(),
            });
        }
        let payload = Payload::copy_from(data)?;
        self.push_event(Event::new(kind, self.now, payload), priority, delay)
    }

    /// Schedules an already-built event without copying its payload.
    pub fn push_event(
        &mut self,
        event: Event,
        priority: Priority,
        delay: u64,
    ) -> Result<(), SchedError> {
        let due = self.now.saturating_add(delay);
        self.store.push(ScheduledItem::new(event, priority, due))?;
        self.check_heap();
        Ok(())
    }

    /// Removes and returns the next live, due event.
    pub fn pop(&mut self) -> Option<Event> {
        let item = self.store.pop_ready(self.now)?;
        self.check_heap();
        Some(item.event)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.store.peek_ready(self.now).map(|item| &item.event)
    }

    /// Number of live items. This is a scan, not a stored counter.
    pub fn size(&self) -> usize {
        self.store.iter().filter(|item| !item.canceled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Marks live items of `kind` as canceled.
    ///
    /// With a matcher only items whose payload bytes equal it are canceled,
    /// otherwise every item of the kind. Returns whether anything matched.
    pub fn cancel(&mut self, kind: EventKind, matcher: Option<&[u8]>) -> bool {
        let mut canceled = false;
        for item in self.store.iter_mut() {
            if item.canceled || item.event.kind != kind {
                continue;
            }
            if matcher.is_some_and(|bytes| item.event.data() != bytes) {
                continue;
            }
            item.canceled = true;
            canceled = true;
        }
        canceled
    }

    /// Compacts out canceled items and restores heap order.
    pub fn purge(&mut self) -> usize {
        let removed = self.store.remove_canceled();
        if removed > 0 {
            debug!("Purged {removed} canceled event(s); {} remain", self.store.len());
        }
        self.check_heap();
        removed
    }

    /// Drops every queued item, live or canceled.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn priority_histogram(&self) -> PriorityHistogram {
        let mut hist = PriorityHistogram::default();
        for item in self.store.iter().filter(|item| !item.canceled) {
            match item.priority {
                Priority::Low => hist.low += 1,
                Priority::Normal => hist.normal += 1,
                Priority::High => hist.high += 1,
                Priority::Critical => hist.critical += 1,
            }
        }
        hist
    }

    /// Returns whether the backing array currently satisfies heap order.
    pub fn validate(&self) -> bool {
        self.store.validate()
    }

    /// All queued items in heap-array order, tombstones included.
    pub fn items(&self) -> impl Iterator<Item = &ScheduledItem> {
        self.store.iter()
    }

    pub(crate) fn store_mut(&mut self) -> &mut EventStore {
        &mut self.store
    }

    #[inline]
    fn check_heap(&self) {
        #[cfg(feature = "heap-check")]
        debug_assert!(self.store.validate(), "event heap order violated");
    }
}
