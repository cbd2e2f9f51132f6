use std::fmt;
use std::num::NonZeroU32;

use crate::event::{Event, EventKind};
use crate::scheduler::EventContext;

/// Subscriber invoked for every dispatched event of its kind.
///
/// Whatever the closure captures plays the role of user context. The
/// [`EventContext`] lets a subscriber schedule or cancel events mid-dispatch;
/// anything it schedules as due can still run within the current tick's
/// budget.
pub type Callback = Box<dyn FnMut(&Event, &mut EventContext<'_>) + Send>;

/// Registration handle returned by [`CallbackTable::register`]. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(NonZeroU32);

impl CallbackId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

struct Subscription {
    id: CallbackId,
    callback: Callback,
}

/// Per-kind subscriber lists, newest registration first.
pub struct CallbackTable {
    lists: [Vec<Subscription>; EventKind::COUNT],
    next_id: u32,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            let ids: Vec<u32> = self.lists[kind.index()]
                .iter()
                .map(|sub| sub.id.get())
                .collect();
            if !ids.is_empty() {
                map.entry(&kind, &ids);
            }
        }
        map.finish()
    }
}

impl CallbackTable {
    pub fn new() -> Self {
        Self {
            lists: std::array::from_fn(|_| Vec::new()),
            next_id: 1,
        }
    }

    pub fn register<F>(&mut self, kind: EventKind, callback: F) -> CallbackId
    where
        F: FnMut(&Event, &mut EventContext<'_>) + Send + 'static,
    {
        let id = self.allocate_id();
        self.lists[kind.index()].insert(
            0,
            Subscription {
                id,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Removes the registration `id` from `kind`'s list.
    pub fn unregister(&mut self, kind: EventKind, id: CallbackId) -> bool {
        let list = &mut self.lists[kind.index()];
        match list.iter().position(|sub| sub.id == id) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Next id not held by any registration. The counter wraps after
    /// `u32::MAX`.
    fn allocate_id(&mut self) -> CallbackId {
        loop {
            let id = CallbackId(NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN));
            self.next_id = id.get().checked_add(1).unwrap_or(1);
            let taken = self.lists.iter().flatten().any(|sub| sub.id == id);
            if !taken {
                return id;
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lists[kind.index()].len()
    }

    /// Invokes every subscriber of `event.kind`, newest first. Returns how
    /// many ran.
    pub fn dispatch(&mut self, event: &Event, ctx: &mut EventContext<'_>) -> usize {
        let list = &mut self.lists[event.kind.index()];
        for sub in list.iter_mut() {
            (sub.callback)(event, &mut *ctx);
        }
        list.len()
    }

}
