use std::mem::size_of;

use crate::error::SchedError;
use crate::event::{Event, Priority, Timestamp};

/// An event waiting in the store together with its scheduling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledItem {
    pub event: Event,
    pub priority: Priority,
    /// Absolute logical time at which the item becomes eligible.
    pub due: Timestamp,
    /// Tombstone flag. Canceled items stay in the array until a purge.
    pub canceled: bool,
}

impl ScheduledItem {
    pub fn new(event: Event, priority: Priority, due: Timestamp) -> Self {
        Self {
            event,
            priority,
            due,
            canceled: false,
        }
    }

    /// Heap order: higher priority first, then earlier due time.
    #[inline]
    pub fn precedes(&self, other: &Self) -> bool {
        self.priority > other.priority || (self.priority == other.priority && self.due < other.due)
    }

    #[inline]
    pub fn is_ready(&self, now: Timestamp) -> bool {
        !self.canceled && self.due <= now
    }
}

/// Bounded array-backed binary heap of [`ScheduledItem`]s.
///
/// Extraction is readiness-aware rather than strict: the root is taken when it
/// is live and due, otherwise the first live and due item in array order is
/// taken. A not-yet-due item near the root therefore never blocks ready items
/// further down.
#[derive(Debug)]
pub struct EventStore {
    items: Vec<ScheduledItem>,
    capacity: usize,
}

impl EventStore {
    pub fn with_capacity(capacity: usize) -> Result<Self, SchedError> {
        if capacity == 0 {
            return Err(SchedError::InvalidArgument("queue capacity must be non-zero"));
        }

        let mut items = Vec::new();
        items
            .try_reserve_exact(capacity)
            .map_err(|_| SchedError::AllocationFailed {
                bytes: capacity.saturating_mul(size_of::<ScheduledItem>()),
            })?;

        Ok(Self { items, capacity })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical occupancy, tombstones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn push(&mut self, item: ScheduledItem) -> Result<(), SchedError> {
        if self.is_full() {
            return Err(SchedError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
        Ok(())
    }

    /// Index of the item the next pop would return.
    fn ready_position(&self, now: Timestamp) -> Option<usize> {
        match self.items.first() {
            None => None,
            Some(root) if root.is_ready(now) => Some(0),
            Some(_) => self.items.iter().position(|item| item.is_ready(now)),
        }
    }

    pub fn peek_ready(&self, now: Timestamp) -> Option<&ScheduledItem> {
        self.ready_position(now).map(|idx| &self.items[idx])
    }

    pub fn pop_ready(&mut self, now: Timestamp) -> Option<ScheduledItem> {
        let idx = self.ready_position(now)?;
        Some(self.remove_at(idx))
    }

    fn remove_at(&mut self, index: usize) -> ScheduledItem {
        // swap_remove moves the last element into the vacated slot.
        let item = self.items.swap_remove(index);
        if index < self.items.len() && self.sift_down(index) == index {
            self.sift_up(index);
        }
        item
    }

    /// Restores heap order with sift-downs from the midpoint backward.
    pub fn rebuild(&mut self) {
        for i in (0..self.items.len() / 2).rev() {
            self.sift_down(i);
        }
    }

    /// Drops every tombstone, keeping the survivors in array order, then
    /// rebuilds. Returns the number of items removed.
    pub fn remove_canceled(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.canceled);
        let removed = before - self.items.len();
        self.rebuild();
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledItem> {
        self.items.iter()
    }

    /// Mutable access for in-place metadata updates (cancel, regulation).
    ///
    /// Callers that change `priority` or `due` must call [`Self::rebuild`].
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ScheduledItem> {
        self.items.iter_mut()
    }

    /// Returns whether no child is ordered before its parent.
    pub fn validate(&self) -> bool {
        (1..self.items.len()).all(|i| !self.items[i].precedes(&self.items[(i - 1) / 2]))
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.items[index].precedes(&self.items[parent]) {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
    }

    /// Returns the index the element finally settled at.
    fn sift_down(&mut self, mut index: usize) -> usize {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;

            if left < len && self.items[left].precedes(&self.items[best]) {
                best = left;
            }
            if right < len && self.items[right].precedes(&self.items[best]) {
                best = right;
            }
            if best == index {
                return index;
            }
            self.items.swap(index, best);
            index = best;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Payload};

    fn item(kind: EventKind, priority: Priority, due: Timestamp) -> ScheduledItem {
        ScheduledItem::new(Event::new(kind, 0, Payload::Empty), priority, due)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            EventStore::with_capacity(0),
            Err(SchedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn root_is_highest_priority_then_earliest() {
        let mut store = EventStore::with_capacity(8).unwrap();
        store.push(item(EventKind::FrameStart, Priority::Normal, 5)).unwrap();
        store.push(item(EventKind::FrameEnd, Priority::High, 9)).unwrap();
        store.push(item(EventKind::VBlank, Priority::High, 3)).unwrap();
        store.push(item(EventKind::HBlank, Priority::Low, 0)).unwrap();
        assert!(store.validate());

        let root = store.peek_ready(100).unwrap();
        assert_eq!(root.event.kind, EventKind::VBlank);
    }

    #[test]
    fn not_yet_due_root_does_not_block_ready_items() {
        let mut store = EventStore::with_capacity(4).unwrap();
        store.push(item(EventKind::VBlank, Priority::Critical, 50)).unwrap();
        store.push(item(EventKind::HBlank, Priority::Low, 10)).unwrap();

        let popped = store.pop_ready(10).unwrap();
        assert_eq!(popped.event.kind, EventKind::HBlank);
        assert!(store.pop_ready(10).is_none());
        assert_eq!(store.pop_ready(50).unwrap().event.kind, EventKind::VBlank);
    }

    #[test]
    fn full_store_rejects_push() {
        let mut store = EventStore::with_capacity(1).unwrap();
        store.push(item(EventKind::Timed, Priority::Low, 0)).unwrap();
        assert_eq!(
            store.push(item(EventKind::Timed, Priority::Low, 0)),
            Err(SchedError::CapacityExceeded { capacity: 1 })
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn removal_from_middle_keeps_heap_valid() {
        let mut store = EventStore::with_capacity(16).unwrap();
        let dues = [40, 7, 33, 12, 90, 1, 64, 25, 18, 3];
        for (i, due) in dues.iter().enumerate() {
            let priority = Priority::ALL[i % 4];
            store.push(item(EventKind::Timed, priority, *due)).unwrap();
        }
        // Only a few items are due; pops come from arbitrary positions.
        while let Some(popped) = store.pop_ready(20) {
            assert!(popped.due <= 20);
            assert!(store.validate());
        }
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn canceled_items_are_skipped_and_purged() {
        let mut store = EventStore::with_capacity(4).unwrap();
        store.push(item(EventKind::InputPoll, Priority::High, 0)).unwrap();
        store.push(item(EventKind::Timed, Priority::Low, 0)).unwrap();
        for it in store.iter_mut() {
            if it.event.kind == EventKind::InputPoll {
                it.canceled = true;
            }
        }
        assert_eq!(store.peek_ready(0).unwrap().event.kind, EventKind::Timed);
        assert_eq!(store.remove_canceled(), 1);
        assert_eq!(store.remove_canceled(), 0);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn blocked_root_falls_back_to_array_order() {
        let mut store = EventStore::with_capacity(4).unwrap();
        store.push(item(EventKind::VBlank, Priority::Critical, 50)).unwrap();
        store.push(item(EventKind::Timed, Priority::Low, 0)).unwrap();
        store.push(item(EventKind::HBlank, Priority::High, 0)).unwrap();
        assert!(store.validate());

        // The root is not due yet, so the first due item in array order wins
        // even though a higher-priority due item sits after it.
        assert_eq!(store.peek_ready(0).unwrap().event.kind, EventKind::Timed);
        assert_eq!(store.pop_ready(0).unwrap().event.kind, EventKind::Timed);
        assert_eq!(store.pop_ready(0).unwrap().event.kind, EventKind::HBlank);
        assert!(store.pop_ready(0).is_none());
        assert_eq!(store.pop_ready(50).unwrap().event.kind, EventKind::VBlank);
    }
}
