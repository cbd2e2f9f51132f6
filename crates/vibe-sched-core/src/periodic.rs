use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::SchedError;
use crate::event::{Event, EventKind, Payload, Priority, Timestamp, copy_bytes};
use crate::queue::EventQueue;

pub const DEFAULT_PERIODIC_SLOTS: usize = 64;

/// Identifier returned by [`PeriodicRegistry::schedule`]. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodicId(NonZeroU32);

impl PeriodicId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for PeriodicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "periodic#{}", self.0)
    }
}

/// Template for a recurring event.
#[derive(Debug, Clone)]
pub struct PeriodicDescriptor {
    pub id: PeriodicId,
    pub kind: EventKind,
    pub priority: Priority,
    pub interval: u64,
    /// Time at which the registry enqueues the next instance.
    pub next_trigger: Timestamp,
    /// Instances still to be enqueued; `None` repeats forever.
    pub remaining: Option<u32>,
    /// Due time of the most recently enqueued instance.
    last_due: Timestamp,
    payload: Payload,
}

impl PeriodicDescriptor {
    pub fn payload(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Outcome of one [`PeriodicRegistry::update`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FiringReport {
    pub enqueued: usize,
    /// Firings lost because the queue was full.
    pub dropped: usize,
    pub retired: usize,
}

/// Fixed-capacity table of periodic descriptors.
///
/// The payload is copied once at registration and shared by every instance
/// the descriptor spawns.
#[derive(Debug)]
pub struct PeriodicRegistry {
    slots: Vec<Option<PeriodicDescriptor>>,
    next_id: u32,
}

impl Default for PeriodicRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PERIODIC_SLOTS)
    }
}

impl PeriodicRegistry {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots).map(|_| None).collect(),
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn get(&self, id: PeriodicId) -> Option<&PeriodicDescriptor> {
        self.iter().find(|desc| desc.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeriodicDescriptor> {
        self.slots.iter().flatten()
    }

    /// Registers a recurring event and enqueues its first instance.
    ///
    /// The first instance becomes due one full `interval` from now and counts
    /// as the first of `repeat_count` firings (0 repeats forever). Nothing is
    /// registered if that first instance cannot be queued.
    pub fn schedule(
        &mut self,
        queue: &mut EventQueue,
        kind: EventKind,
        data: &[u8],
        priority: Priority,
        interval: u64,
        repeat_count: u32,
    ) -> Result<PeriodicId, SchedError> {
        if interval == 0 {
            return Err(SchedError::InvalidArgument("periodic interval must be non-zero"));
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SchedError::RegistryFull {
                slots: self.slots.len(),
            })?;

        let payload = if data.is_empty() {
            Payload::Empty
        } else {
            Payload::Shared(Arc::from(copy_bytes(data)?))
        };

        let now = queue.now();
        queue.push_event(Event::new(kind, now, payload.clone()), priority, interval)?;

        let id = self.allocate_id();
        let first_due = now.saturating_add(interval);
        self.slots[slot] = Some(PeriodicDescriptor {
            id,
            kind,
            priority,
            interval,
            next_trigger: first_due.saturating_add(interval),
            remaining: (repeat_count > 0).then(|| repeat_count - 1),
            last_due: first_due,
            payload,
        });

        debug!("Registered {id} ({kind:?}, every {interval}, repeat {repeat_count})");
        Ok(id)
    }

    /// Enqueues instances for descriptors whose trigger time has passed and
    /// retires exhausted descriptors once their final instance is due.
    ///
    /// Each descriptor fires at most once per call.
    pub fn update(&mut self, queue: &mut EventQueue) -> FiringReport {
        let now = queue.now();
        let mut report = FiringReport::default();

        for slot in &mut self.slots {
            let Some(desc) = slot.as_mut() else {
                continue;
            };

            if !desc.exhausted() && desc.next_trigger <= now {
                let event = Event::new(desc.kind, now, desc.payload.clone());
                match queue.push_event(event, desc.priority, 0) {
                    Ok(()) => report.enqueued += 1,
                    Err(e) => {
                        warn!("Dropped firing of {}: {e}", desc.id);
                        report.dropped += 1;
                    }
                }
                desc.last_due = now;
                desc.next_trigger = desc.next_trigger.saturating_add(desc.interval);
                if let Some(remaining) = desc.remaining.as_mut() {
                    *remaining -= 1;
                }
            }

            if desc.exhausted() && now >= desc.last_due {
                debug!("Retired {} after final firing", desc.id);
                *slot = None;
                report.retired += 1;
            }
        }

        report
    }

    /// Deactivates `id` and cancels every queued event of its kind.
    ///
    /// The match is by kind only, so one-shot events of the same kind are
    /// canceled as well.
    pub fn cancel(&mut self, queue: &mut EventQueue, id: PeriodicId) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|desc| desc.id == id))
        else {
            return false;
        };

        if let Some(desc) = slot.take() {
            queue.cancel(desc.kind, None);
            debug!("Canceled {id} ({:?})", desc.kind);
        }
        true
    }

    /// Next id not held by a live descriptor. The counter wraps after
    /// `u32::MAX`; only called with a free slot, so the search terminates.
    fn allocate_id(&mut self) -> PeriodicId {
        loop {
            let id = PeriodicId(NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN));
            self.next_id = id.get().checked_add(1).unwrap_or(1);
            if self.get(id).is_none() {
                return id;
            }
        }
    }
}
