use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchedError;

/// Logical timestamp supplied by the caller on every tick.
///
/// The scheduler never reads a wall clock for ordering; units are whatever the
/// frontend chooses (milliseconds in the bundled driver).
pub type Timestamp = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Kinds of events routed through the scheduler.
pub enum EventKind {
    FrameStart,
    FrameEnd,
    VBlank,
    HBlank,
    InputPoll,
    TimerTick,
    AudioBuffer,
    SerialTransfer,
    UiNotify,
    Timed,
}

impl EventKind {
    /// Number of distinct kinds; sizes the per-kind subscriber table.
    pub const COUNT: usize = 10;

    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::FrameStart,
        EventKind::FrameEnd,
        EventKind::VBlank,
        EventKind::HBlank,
        EventKind::InputPoll,
        EventKind::TimerTick,
        EventKind::AudioBuffer,
        EventKind::SerialTransfer,
        EventKind::UiNotify,
        EventKind::Timed,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for EventKind {
    type Error = SchedError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(SchedError::UnknownEventKind(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
/// Event priority. Higher variants are dispatched first.
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];
}

/// Payload carried by an event.
///
/// The variant records who owns the bytes:
/// - `Owned` is a private copy made when a one-shot event is scheduled. It is
///   released together with the queued item (after dispatch, purge or clear).
/// - `Shared` belongs to a periodic descriptor. Every instance it spawns holds
///   a reference; the registry drops its own reference when the descriptor is
///   canceled or runs out of repeats.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    Empty,
    Owned(Box<[u8]>),
    Shared(Arc<[u8]>),
}

impl Payload {
    /// Copies `bytes` into a new one-shot payload.
    pub fn copy_from(bytes: &[u8]) -> Result<Self, SchedError> {
        if bytes.is_empty() {
            return Ok(Payload::Empty);
        }
        copy_bytes(bytes).map(Payload::Owned)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Empty => &[],
            Payload::Owned(bytes) => bytes,
            Payload::Shared(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Payload::Shared(_))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Owned(bytes) => write!(f, "Owned({} bytes)", bytes.len()),
            Payload::Shared(bytes) => write!(
                f,
                "Shared({} bytes, {} refs)",
                bytes.len(),
                Arc::strong_count(bytes)
            ),
        }
    }
}

/// Copies `bytes` into a fresh boxed slice, reporting allocation failure
/// instead of aborting.
pub(crate) fn copy_bytes(bytes: &[u8]) -> Result<Box<[u8]>, SchedError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|_| SchedError::AllocationFailed { bytes: bytes.len() })?;
    buf.extend_from_slice(bytes);
    Ok(buf.into_boxed_slice())
}

/// An event as seen by subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Logical time at which the event was scheduled.
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: Timestamp, payload: Payload) -> Self {
        Self {
            kind,
            timestamp,
            payload,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.payload.as_bytes()
    }
}
